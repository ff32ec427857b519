//! # Citation recognition
//!
//! This crate finds citekey references such as `@doe2020` or
//! `[@doe2020, p. 12]` in note text. It provides:
//!
//! - **Pattern**: a matcher compiled from a configurable prefix
//! - **Annotation**: in-place replacement of citations in rendered fragments
//!   with interactive markers
//! - **Live decoration**: incrementally maintained highlight ranges for an
//!   editable document
//! - **Rendering**: markdown to fragment conversion for post-processing
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Citation Recognition                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  prefix ──► CitationPattern ──┬──► annotate(Fragment)        │
//! │                               │        ▲                     │
//! │                               │   render_markdown            │
//! │                               │                              │
//! │                               └──► LiveDecorator             │
//! │                                        ▲                     │
//! │                                   ViewUpdate + ChangeSet     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod annotate;
pub mod decorate;
pub mod error;
pub mod fragment;
pub mod pattern;
pub mod render;

pub use annotate::annotate;
pub use decorate::{
    Assoc, ChangeSet, HIGHLIGHT_CLASS, Highlight, LiveDecorator, MAX_INCREMENTAL_SPAN, Refresh,
    TextEdit, ViewUpdate, full_scan,
};
pub use error::{CitationError, PatternError, Result};
pub use fragment::{
    ActivateHandler, Activation, CITATION_CLASS, CitationMarker, Element, Fragment, Node,
};
pub use pattern::{Citation, CitationForm, CitationMatch, CitationMatches, CitationPattern};
pub use render::render_markdown;
