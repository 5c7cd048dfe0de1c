use async_trait::async_trait;
use subcrawl_common::{Outcome, SubmissionId};

use super::RecordSource;
use crate::error::Result;

/// Outcome already present in the stored batch, returned verbatim
#[derive(Debug, Clone)]
pub struct CachedBatchSource {
    outcome: Outcome,
}

impl CachedBatchSource {
    pub fn new(outcome: Outcome) -> Self {
        Self { outcome }
    }
}

#[async_trait]
impl RecordSource for CachedBatchSource {
    fn name(&self) -> &'static str {
        "cached"
    }

    async fn resolve(&self, _id: SubmissionId) -> Result<Outcome> {
        Ok(self.outcome.clone())
    }
}
