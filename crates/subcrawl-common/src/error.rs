//! Error types shared across subcrawl crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised by the shared model and addressing code
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid batch file name: {0}")]
    InvalidBatchName(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
