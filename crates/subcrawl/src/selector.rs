//! Per-id source selection
//!
//! First match wins:
//!
//! 1. the stored batch already has an outcome for the id
//! 2. a legacy archive covers the id and has an entry for it
//! 3. a captured snapshot exists for the id
//! 4. a remote API is configured
//! 5. a session cookie is configured for the live site
//!
//! With none of these available the id cannot be resolved and selection
//! fails with a configuration error.

use std::path::PathBuf;
use std::sync::Arc;
use subcrawl_common::SubmissionId;
use tracing::trace;

use crate::context::CrawlContext;
use crate::error::{CrawlError, Result};
use crate::sources::{
    AuthenticatedSiteSource, CachedBatchSource, LegacyArchive, LegacyArchiveSource,
    LocalSnapshotSource, RecordSource, RemoteApi, RemoteApiSource, SiteClient,
};
use crate::store::BatchStore;

pub struct SourceSelector {
    store: Arc<BatchStore>,
    legacy: Arc<LegacyArchive>,
    snapshot_root: Option<PathBuf>,
    remote: Option<RemoteApi>,
    site: Option<Arc<SiteClient>>,
}

impl SourceSelector {
    pub fn new(store: Arc<BatchStore>) -> Self {
        Self {
            store,
            legacy: Arc::new(LegacyArchive::empty()),
            snapshot_root: None,
            remote: None,
            site: None,
        }
    }

    /// Selector over everything the context's configuration enables
    pub fn from_context(ctx: &CrawlContext, legacy: Arc<LegacyArchive>) -> Self {
        let config = &ctx.config;
        let site = config.cookie_header().map(|cookie| {
            Arc::new(SiteClient::new(
                ctx.client.clone(),
                config.site_url.clone(),
                Some(cookie),
            ))
        });

        Self {
            store: Arc::clone(&ctx.store),
            legacy,
            snapshot_root: config.snapshot_dir.clone(),
            remote: RemoteApi::from_config(ctx.client.clone(), Arc::clone(config)),
            site,
        }
    }

    pub fn with_snapshot_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.snapshot_root = Some(root.into());
        self
    }

    pub async fn select(&self, id: SubmissionId) -> Result<Box<dyn RecordSource>> {
        let source: Box<dyn RecordSource> = if let Some(outcome) = self.store.lookup(id).await? {
            Box::new(CachedBatchSource::new(outcome))
        } else if let Some(entry) = self.legacy.entry(id).await? {
            Box::new(LegacyArchiveSource::new(entry))
        } else if let Some(snapshot) = self.find_snapshot(id).await {
            Box::new(snapshot)
        } else if let Some(remote) = &self.remote {
            Box::new(RemoteApiSource::new(remote.clone()))
        } else if let Some(site) = &self.site {
            Box::new(AuthenticatedSiteSource::new(Arc::clone(site)))
        } else {
            return Err(CrawlError::config(format!(
                "no source can resolve submission {id}: set API_URL or LOGIN_COOKIE"
            )));
        };

        trace!(id, source = source.name(), "Selected source");
        Ok(source)
    }

    async fn find_snapshot(&self, id: SubmissionId) -> Option<LocalSnapshotSource> {
        match &self.snapshot_root {
            Some(root) => LocalSnapshotSource::find(root, id).await,
            None => None,
        }
    }
}
