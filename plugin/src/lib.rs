//! # BibLaTeX Graph
//!
//! The controller that wires citation recognition into a note-taking host.
//! It provides:
//!
//! - **Settings**: citation prefix, reference folder, auto-creation and
//!   projection policy, persisted as JSON
//! - **Rendering hook**: citation markers in rendered fragments
//! - **Editor hook**: live citation highlighting that follows the settings
//! - **Graph links**: citation links projected into the host's link index
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        BiblatexGraph                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Settings ──► CitationPattern ──watch──► CitationView        │
//! │                     │                                        │
//! │                     ├──► post_process(Fragment)              │
//! │                     │          │ activation                  │
//! │                     │          ▼                             │
//! │  HostSignal ──► handle_signal ──► ReferenceResolver          │
//! │                     │                                        │
//! │                     └──► LinkProjector ──► SharedLinkIndex   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod controller;
pub mod error;
pub mod settings;
pub mod view;

pub use controller::{BiblatexGraph, HostSignal};
pub use error::{PluginError, Result};
pub use settings::{DEFAULT_CITATION_PREFIX, DEFAULT_REFERENCE_FOLDER, Settings, SettingsStore};
pub use view::CitationView;
