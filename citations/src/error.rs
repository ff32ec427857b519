//! Error types for citation recognition.

use thiserror::Error;

/// Result type alias for citation operations.
pub type Result<T> = std::result::Result<T, CitationError>;

/// Errors that can occur while recognising citations.
#[derive(Error, Debug)]
pub enum CitationError {
    /// The citation pattern could not be built.
    #[error("pattern error: {0}")]
    Pattern(#[from] PatternError),
}

/// Pattern-compilation errors.
#[derive(Error, Debug)]
pub enum PatternError {
    /// An empty prefix would turn every citekey-shaped word into a citation.
    #[error("citation prefix must not be empty")]
    EmptyPrefix,

    /// The regex engine rejected the generated pattern.
    #[error("failed to compile citation pattern for prefix {prefix:?}: {source}")]
    Compile {
        prefix: String,
        #[source]
        source: regex_lite::Error,
    },
}
