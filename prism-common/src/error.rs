//! Common error types for Prism

use thiserror::Error;

/// Common result type for Prism operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Prism services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store content changed between load and write
    #[error("Snapshot changed since it was loaded (expected {expected}, found {found})")]
    StaleSnapshot { expected: String, found: String },
}
