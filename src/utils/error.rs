//! Error Handling Module
//!
//! Defines the error type shared by corpus discovery, class splitting and
//! breed reorganization. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for corpus preparation operations
#[derive(Error, Debug)]
pub enum CorpusError {
    /// Unsupported labeling mode string
    #[error("Invalid mode '{0}'. Use 'All', 'Cat', or 'Dog'")]
    InvalidMode(String),

    /// Index outside `[0, len)`
    #[error("Index {index} out of range for corpus of size {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Split ratios are malformed or do not sum to 1.0
    #[error("Ratio error: {0}")]
    Ratio(String),

    /// Breed/class lookup miss, which means discovery produced an inconsistent table
    #[error("Missing class key: {0}")]
    MissingClassKey(String),

    /// A sample file referenced by a split is absent at copy/move time
    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),

    /// Split directories already exist at the destination
    #[error("Destination already exists: {0} (clear it first or resume)")]
    DestinationConflict(PathBuf),

    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for CorpusError {
    fn from(err: serde_json::Error) -> Self {
        CorpusError::Serialization(err.to_string())
    }
}

/// Convenience Result type for corpus operations
pub type Result<T> = std::result::Result<T, CorpusError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| CorpusError::InvalidInput(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| CorpusError::InvalidInput(format!("{}: {}", f(), e)))
    }
}

impl<T> ResultExt<T> for Option<T> {
    fn context(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| CorpusError::InvalidInput(msg.to_string()))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.ok_or_else(|| CorpusError::InvalidInput(f()))
    }
}
