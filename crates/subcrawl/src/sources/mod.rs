//! Record sources
//!
//! Every way of turning a submission id into an [`Outcome`] implements
//! [`RecordSource`]. The [`SourceSelector`](crate::selector::SourceSelector)
//! picks one per id; sources are built per id and carry whatever the selector
//! already learned (a cached outcome, a legacy entry, a snapshot path).

use async_trait::async_trait;
use subcrawl_common::{Outcome, SubmissionId};

use crate::error::Result;

pub mod cached;
pub mod layout;
pub mod legacy;
pub mod remote;
pub mod site;
pub mod snapshot;
pub mod submission;

pub use cached::CachedBatchSource;
pub use layout::PageLayout;
pub use legacy::{LegacyArchive, LegacyArchiveSource};
pub use remote::{RemoteApi, RemoteApiSource};
pub use site::{AuthenticatedSiteSource, SiteClient};
pub use snapshot::{snapshot_path, LocalSnapshotSource};

#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn resolve(&self, id: SubmissionId) -> Result<Outcome>;

    /// Congestion observed during the last `resolve`, if this source can see
    /// site load at all
    fn congestion_signal(&self) -> Option<bool> {
        None
    }
}
