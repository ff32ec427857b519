//! Error types for vault access.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur while accessing a vault.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Nothing exists at the path.
    #[error("not found: {0}")]
    NotFound(String),

    /// A file or folder already exists at the path.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The path escapes the vault or is otherwise unusable.
    #[error("invalid vault path: {0}")]
    InvalidPath(String),

    /// The vault root is missing or not a directory.
    #[error("vault root not found: {0}")]
    RootNotFound(String),

    /// Opening a document in the workspace failed.
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },

    /// Notify error.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
