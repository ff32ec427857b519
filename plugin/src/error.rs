//! Error types for the plugin controller.

use bibgraph_citations::CitationError;
use bibgraph_vault::VaultError;
use thiserror::Error;

/// Result type alias for plugin operations.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Errors that can occur in the plugin controller.
#[derive(Error, Debug)]
pub enum PluginError {
    /// Citation pattern could not be built.
    #[error("citation error: {0}")]
    Citation(#[from] CitationError),

    /// Vault operation failed.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Stored settings could not be understood.
    #[error("invalid settings: {0}")]
    Settings(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
