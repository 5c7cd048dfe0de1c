//! subcrawl Common Library
//!
//! Shared types, utilities, and error handling for the subcrawl workspace.
//!
//! # Overview
//!
//! - **Error Handling**: Common error type and result alias
//! - **Types**: The normalized submission record, per-id outcomes and batch addressing
//! - **Logging**: `tracing` subscriber setup shared by the binaries
//!
//! # Example
//!
//! ```no_run
//! use subcrawl_common::types::BatchRange;
//!
//! let range = BatchRange::containing(150);
//! assert_eq!(range.file_name(), "batch-00000100-00000200.json");
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{
    parse_batch_file_name, BatchFile, BatchRange, Outcome, Record, SubmissionId, BATCH_SIZE,
};
