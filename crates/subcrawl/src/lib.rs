//! subcrawl
//!
//! Crawls the submission id space in aligned batches of 100, resolving each
//! id through the cheapest available source and persisting every batch as
//! one JSON file so a run can resume exactly where the last one stopped.
//!
//! # Sources
//!
//! In priority order:
//!
//! - **Cached**: an outcome already present in the stored batch
//! - **Legacy**: first-generation archive files
//! - **Snapshot**: raw pages captured with `subcrawl capture`
//! - **Remote**: structured JSON API, optionally spread over mirrors
//! - **Site**: the live site, with a session cookie
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use subcrawl::{CrawlConfig, CrawlContext, LegacyArchive, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CrawlConfig::default().with_api_urls(["https://api.example"]);
//!     let ctx = CrawlContext::new(config)?;
//!     let orchestrator = Orchestrator::from_context(&ctx, Arc::new(LegacyArchive::empty()));
//!     orchestrator.run(1, Some(1_000)).await?;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod cache;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod fetcher;
pub mod governor;
pub mod orchestrator;
pub mod resume;
pub mod retry;
pub mod selector;
pub mod sources;
pub mod store;

pub use capture::{CaptureSummary, SnapshotCapture};
pub use config::CrawlConfig;
pub use context::CrawlContext;
pub use error::{CrawlError, Result};
pub use fetcher::ConcurrentFetcher;
pub use governor::RateGovernor;
pub use orchestrator::{choose_start, CrawlSummary, Orchestrator};
pub use retry::RetryPolicy;
pub use selector::SourceSelector;
pub use sources::{LegacyArchive, RecordSource};
pub use store::BatchStore;
