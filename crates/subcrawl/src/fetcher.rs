//! Concurrent batch fetching
//!
//! Ids of a batch are fanned out over a bounded pool. Each worker consults
//! the rate governor, selects a source and resolves the id, retrying
//! transient failures per the retry policy. Results come back in input
//! order regardless of completion order.

use std::future::Future;
use std::sync::Arc;
use subcrawl_common::{Outcome, SubmissionId};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::context::CrawlContext;
use crate::error::{CrawlError, Result};
use crate::governor::RateGovernor;
use crate::retry::RetryPolicy;
use crate::selector::SourceSelector;

pub struct ConcurrentFetcher {
    selector: Arc<SourceSelector>,
    governor: Arc<RateGovernor>,
    policy: RetryPolicy,
    concurrency: usize,
}

impl ConcurrentFetcher {
    pub fn new(
        selector: Arc<SourceSelector>,
        governor: Arc<RateGovernor>,
        policy: RetryPolicy,
        concurrency: usize,
    ) -> Self {
        Self {
            selector,
            governor,
            policy,
            concurrency,
        }
    }

    pub fn from_context(ctx: &CrawlContext, selector: Arc<SourceSelector>) -> Self {
        Self::new(
            selector,
            Arc::clone(&ctx.governor),
            ctx.retry_policy(),
            ctx.config.concurrency,
        )
    }

    /// Resolve every id; `outcomes[i]` belongs to `ids[i]`.
    ///
    /// Fails as a whole if any id hits a fatal error or runs out of attempts.
    pub async fn fetch_batch(&self, ids: &[SubmissionId]) -> Result<Vec<Outcome>> {
        run_ordered(ids, self.concurrency, |id| {
            let selector = Arc::clone(&self.selector);
            let governor = Arc::clone(&self.governor);
            let policy = self.policy.clone();
            async move {
                with_retry(id, &policy, &governor, || {
                    resolve_once(&selector, &governor, id)
                })
                .await
            }
        })
        .await
    }
}

async fn resolve_once(
    selector: &SourceSelector,
    governor: &RateGovernor,
    id: SubmissionId,
) -> Result<Outcome> {
    let source = selector.select(id).await?;
    let result = source.resolve(id).await;
    governor.report(source.congestion_signal());

    let outcome = result?;
    info!(
        id,
        source = source.name(),
        absent = outcome.is_absent(),
        "Resolved submission"
    );
    Ok(outcome)
}

/// Run `attempt` until it succeeds, pausing while the governor reports
/// congestion and backing off between failures.
pub(crate) async fn with_retry<T, F, Fut>(
    id: SubmissionId,
    policy: &RetryPolicy,
    governor: &RateGovernor,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        governor.pause_if_congested().await;
        attempts += 1;

        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => e,
        };

        match policy.delay_after(attempts) {
            Some(delay) => {
                warn!(
                    id,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                return Err(CrawlError::RetriesExhausted {
                    id,
                    attempts,
                    last_error: err.to_string(),
                })
            }
        }
    }
}

/// Drive one future per id with at most `concurrency` running at once and
/// collect the results in id order. The first error aborts the remaining
/// tasks.
pub(crate) async fn run_ordered<T, F, Fut>(
    ids: &[SubmissionId],
    concurrency: usize,
    mut work: F,
) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: FnMut(SubmissionId) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, &id) in ids.iter().enumerate() {
        let permits = Arc::clone(&permits);
        let job = work(id);
        tasks.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| CrawlError::Worker(e.to_string()))?;
            job.await.map(|value| (index, value))
        });
    }

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(ids.len()).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, value) = joined.map_err(|e| CrawlError::Worker(e.to_string()))??;
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(value);
        }
    }

    slots
        .into_iter()
        .zip(ids)
        .map(|(slot, id)| {
            slot.ok_or_else(|| CrawlError::Worker(format!("no result for submission {id}")))
        })
        .collect()
}
