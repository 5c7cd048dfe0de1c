//! Batch loop
//!
//! Walks aligned batches from a start id up to an optional exclusive end.
//! Batches already complete in the store are skipped; every other batch is
//! fetched in full and saved before moving on.

use std::sync::Arc;
use subcrawl_common::{BatchFile, BatchRange, SubmissionId};
use tracing::{debug, info};

use crate::context::CrawlContext;
use crate::error::Result;
use crate::fetcher::ConcurrentFetcher;
use crate::resume::batch_resume_point;
use crate::selector::SourceSelector;
use crate::sources::LegacyArchive;
use crate::store::BatchStore;

/// Id the crawl starts from when nothing else says otherwise
pub const DEFAULT_START: SubmissionId = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub batches_written: u64,
    pub batches_skipped: u64,
    pub found: u64,
    pub absent: u64,
}

/// Pick the first id to crawl: an explicit start, then the stored resume
/// point, then the configured start, then [`DEFAULT_START`].
pub fn choose_start(
    explicit: Option<SubmissionId>,
    resumed: Option<SubmissionId>,
    configured: Option<SubmissionId>,
) -> SubmissionId {
    explicit.or(resumed).or(configured).unwrap_or(DEFAULT_START)
}

pub struct Orchestrator {
    store: Arc<BatchStore>,
    fetcher: ConcurrentFetcher,
}

impl Orchestrator {
    pub fn new(store: Arc<BatchStore>, fetcher: ConcurrentFetcher) -> Self {
        Self { store, fetcher }
    }

    pub fn from_context(ctx: &CrawlContext, legacy: Arc<LegacyArchive>) -> Self {
        let selector = Arc::new(SourceSelector::from_context(ctx, legacy));
        Self::new(
            Arc::clone(&ctx.store),
            ConcurrentFetcher::from_context(ctx, selector),
        )
    }

    /// Resume point of the local batch tree
    pub fn resume_point(&self) -> Result<Option<SubmissionId>> {
        batch_resume_point(self.store.root())
    }

    pub async fn run(
        &self,
        start: SubmissionId,
        end: Option<SubmissionId>,
    ) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        let mut range = BatchRange::containing(start);

        info!(start, end = ?end, "Starting crawl");
        while end.is_none_or(|end| range.start() < end) {
            if self.store.is_complete(range).await? {
                debug!(batch = %range, "Batch already stored, skipping");
                summary.batches_skipped += 1;
            } else {
                let batch = self.crawl_batch(range).await?;
                let absent = batch.values().filter(|o| o.is_absent()).count() as u64;
                summary.absent += absent;
                summary.found += batch.len() as u64 - absent;
                summary.batches_written += 1;
            }
            range = range.next();
        }

        info!(
            written = summary.batches_written,
            skipped = summary.batches_skipped,
            found = summary.found,
            absent = summary.absent,
            "Crawl finished"
        );
        Ok(summary)
    }

    /// Fetch and persist one batch
    pub async fn crawl_batch(&self, range: BatchRange) -> Result<BatchFile> {
        info!(batch = %range, "Start batch");

        let ids: Vec<SubmissionId> = range.ids().collect();
        let outcomes = self.fetcher.fetch_batch(&ids).await?;
        let batch: BatchFile = ids.into_iter().zip(outcomes).collect();
        self.store.save(range, &batch).await?;

        info!(batch = %range, "End batch");
        Ok(batch)
    }
}
