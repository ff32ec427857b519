//! Vault change events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A change to a markdown document in the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEvent {
    /// The kind of change.
    pub kind: VaultEventKind,

    /// Vault path of the document.
    pub path: String,

    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
}

impl VaultEvent {
    pub fn new(kind: VaultEventKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }

    /// Whether the change can affect citation links.
    pub fn affects_links(&self) -> bool {
        !matches!(self.kind, VaultEventKind::Accessed | VaultEventKind::Unknown)
    }
}

/// Kind of vault change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultEventKind {
    Created,
    Modified,
    Deleted,
    Renamed,
    Accessed,
    Unknown,
}

impl From<notify::EventKind> for VaultEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => Self::Created,
            notify::EventKind::Modify(notify::event::ModifyKind::Name(_)) => Self::Renamed,
            notify::EventKind::Modify(_) => Self::Modified,
            notify::EventKind::Remove(_) => Self::Deleted,
            notify::EventKind::Access(_) => Self::Accessed,
            _ => Self::Unknown,
        }
    }
}
