//! Process-wide congestion flag
//!
//! Sources that can observe site load report a congestion signal after each
//! fetch. The fetcher reads the flag before every attempt and backs off while
//! it is set. Last report wins; `None` reports leave the flag untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Registered users online above which the site is considered congested
pub const CONGESTION_THRESHOLD: u64 = 10_000;

/// Map an observed "registered users online" count to a congestion signal
pub fn congestion_from_online(registered: u64) -> bool {
    registered > CONGESTION_THRESHOLD
}

#[derive(Debug)]
pub struct RateGovernor {
    congested: AtomicBool,
    delay: Duration,
}

impl RateGovernor {
    pub fn new(delay: Duration) -> Self {
        Self {
            congested: AtomicBool::new(false),
            delay,
        }
    }

    pub fn is_congested(&self) -> bool {
        self.congested.load(Ordering::Relaxed)
    }

    /// Record a source's signal. Only eventual visibility is needed, so relaxed
    /// ordering is enough.
    pub fn report(&self, signal: Option<bool>) {
        if let Some(congested) = signal {
            let previous = self.congested.swap(congested, Ordering::Relaxed);
            if previous != congested {
                debug!(congested, "Congestion flag changed");
            }
        }
    }

    /// Sleep for the configured delay if the flag is currently set.
    /// Returns whether a pause happened.
    pub async fn pause_if_congested(&self) -> bool {
        if !self.is_congested() {
            return false;
        }
        tokio::time::sleep(self.delay).await;
        true
    }
}
