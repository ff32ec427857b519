//! # Vault
//!
//! This crate connects citation recognition to a note vault. It provides:
//!
//! - **Storage**: the [`Vault`] and [`Workspace`] seams, with directory and
//!   in-memory vaults
//! - **Link projection**: citation links written into the host's resolved
//!   link index
//! - **Reference resolution**: opening or creating the note for a citekey
//! - **Watching**: markdown change events from a vault directory
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Vault                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Vault ──► LinkProjector ──► SharedLinkIndex                 │
//! │    │            ▲                                            │
//! │    │      CitationPattern                                    │
//! │    ▼                                                         │
//! │  ReferenceResolver ──► Workspace (open, notice)              │
//! │                                                              │
//! │  VaultWatcher ──► VaultEvent                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod event;
pub mod links;
pub mod path;
pub mod projector;
pub mod resolver;
pub mod storage;
pub mod watcher;

pub use error::{Result, VaultError};
pub use event::{VaultEvent, VaultEventKind};
pub use links::{LinkCounts, LinkIndex, SharedLinkIndex};
pub use path::{normalize_path, reference_path};
pub use projector::{LinkProjector, ProjectionPolicy, ProjectionReport};
pub use resolver::{ReferenceResolver, Resolution, note_template};
pub use storage::{FsVault, MemoryVault, RecordingWorkspace, Vault, VaultEntry, Workspace};
pub use watcher::VaultWatcher;
