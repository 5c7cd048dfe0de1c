//! Raw page capture
//!
//! Fills the snapshot tree with live pages, one aligned batch at a time,
//! using the same pool size, rate governor and retry policy as the crawl.
//! A page answered with 404 is stored as an empty file; any other
//! non-success status is retried like a failed fetch.

use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subcrawl_common::{BatchRange, SubmissionId};
use tracing::{debug, info};

use crate::context::CrawlContext;
use crate::error::{CrawlError, Result};
use crate::fetcher::{run_ordered, with_retry};
use crate::governor::{congestion_from_online, RateGovernor};
use crate::resume::snapshot_resume_point;
use crate::retry::RetryPolicy;
use crate::sources::layout::parse_online_registered;
use crate::sources::{snapshot_path, SiteClient};
use crate::store::write_atomic;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub batches: u64,
    pub pages: u64,
    pub empty: u64,
}

pub struct SnapshotCapture {
    site: Arc<SiteClient>,
    governor: Arc<RateGovernor>,
    policy: RetryPolicy,
    concurrency: usize,
    root: PathBuf,
}

impl SnapshotCapture {
    pub fn new(
        site: Arc<SiteClient>,
        governor: Arc<RateGovernor>,
        policy: RetryPolicy,
        concurrency: usize,
        root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            site,
            governor,
            policy,
            concurrency,
            root: root.into(),
        }
    }

    /// Capture into `root` with the context's site, session and limits
    pub fn from_context(ctx: &CrawlContext, root: impl Into<PathBuf>) -> Self {
        let site = SiteClient::new(
            ctx.client.clone(),
            ctx.config.site_url.clone(),
            ctx.config.cookie_header(),
        );
        Self::new(
            Arc::new(site),
            Arc::clone(&ctx.governor),
            ctx.retry_policy(),
            ctx.config.concurrency,
            root,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resume_point(&self) -> Result<Option<SubmissionId>> {
        snapshot_resume_point(&self.root)
    }

    pub async fn run(
        &self,
        start: SubmissionId,
        end: Option<SubmissionId>,
    ) -> Result<CaptureSummary> {
        let mut summary = CaptureSummary::default();
        let mut range = BatchRange::containing(start);

        info!(start, end = ?end, root = %self.root.display(), "Starting capture");
        while end.is_none_or(|end| range.start() < end) {
            let sizes = self.capture_batch(range).await?;
            summary.batches += 1;
            summary.pages += sizes.len() as u64;
            summary.empty += sizes.iter().filter(|&&len| len == 0).count() as u64;
            range = range.next();
        }

        info!(
            batches = summary.batches,
            pages = summary.pages,
            empty = summary.empty,
            "Capture finished"
        );
        Ok(summary)
    }

    /// Capture every page of one batch; returns the stored size per id
    pub async fn capture_batch(&self, range: BatchRange) -> Result<Vec<usize>> {
        info!(batch = %range, "Start capture batch");

        let ids: Vec<SubmissionId> = range.ids().collect();
        let sizes = run_ordered(&ids, self.concurrency, |id| {
            let site = Arc::clone(&self.site);
            let governor = Arc::clone(&self.governor);
            let policy = self.policy.clone();
            let root = self.root.clone();
            async move {
                with_retry(id, &policy, &governor, || {
                    capture_page(&site, &governor, &root, id)
                })
                .await
            }
        })
        .await?;

        info!(batch = %range, "End capture batch");
        Ok(sizes)
    }
}

async fn capture_page(
    site: &SiteClient,
    governor: &RateGovernor,
    root: &Path,
    id: SubmissionId,
) -> Result<usize> {
    let response = site.get(id).await?;
    let status = response.status();
    let body = if status.is_success() {
        response.bytes().await?.to_vec()
    } else if status == StatusCode::NOT_FOUND {
        debug!(id, "Page not found, storing empty snapshot");
        Vec::new()
    } else {
        return Err(CrawlError::Status {
            status: status.as_u16(),
            url: site.page_url(id),
        });
    };

    if !body.is_empty() {
        let registered = parse_online_registered(&String::from_utf8_lossy(&body));
        governor.report(registered.map(congestion_from_online));
    }

    write_atomic(&snapshot_path(root, id), &body).await?;
    info!(id, bytes = body.len(), "Captured page");
    Ok(body.len())
}
