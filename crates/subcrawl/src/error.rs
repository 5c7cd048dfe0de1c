//! Error types for the crawler

use subcrawl_common::{BatchRange, CommonError, SubmissionId};
use thiserror::Error;

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Errors raised while resolving, fetching and persisting submissions
#[derive(Error, Debug)]
pub enum CrawlError {
    /// Nothing is configured that could resolve an id. Aborts the run.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A legacy archive file name does not embed a valid range. Aborts startup.
    #[error("Invalid legacy archive {path}: {reason}")]
    LegacyRange { path: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("Submission {id} still failing after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        id: SubmissionId,
        attempts: u32,
        last_error: String,
    },

    /// A batch without an outcome for every id in its range, or with ids
    /// outside it. Never persisted.
    #[error("Refusing to save batch {range}: {reason}")]
    IncompleteBatch { range: BatchRange, reason: String },

    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl CrawlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Fatal errors are never retried; everything else is treated as transient.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CrawlError::Config(_)
                | CrawlError::LegacyRange { .. }
                | CrawlError::RetriesExhausted { .. }
                | CrawlError::IncompleteBatch { .. }
                | CrawlError::Worker(_)
        )
    }
}

impl From<url::ParseError> for CrawlError {
    fn from(err: url::ParseError) -> Self {
        CrawlError::Config(format!("invalid URL: {err}"))
    }
}
