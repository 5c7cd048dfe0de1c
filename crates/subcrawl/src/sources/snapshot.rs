//! Captured page snapshots
//!
//! One raw page per id under
//! `{root}/{id/1_000_000:02}/{(id%1_000_000)/10_000:02}/{(id%10_000)/100:02}/{id}.html`.
//! Snapshots were taken from the classic site design.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use subcrawl_common::{Outcome, SubmissionId};

use super::layout::{parse_page, PageLayout};
use super::RecordSource;
use crate::error::Result;

pub fn snapshot_path(root: &Path, id: SubmissionId) -> PathBuf {
    root.join(format!("{:02}", id / 1_000_000))
        .join(format!("{:02}", (id % 1_000_000) / 10_000))
        .join(format!("{:02}", (id % 10_000) / 100))
        .join(format!("{id}.html"))
}

#[derive(Debug, Clone)]
pub struct LocalSnapshotSource {
    path: PathBuf,
}

impl LocalSnapshotSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Source for `id` if its snapshot exists under `root`
    pub async fn find(root: &Path, id: SubmissionId) -> Option<Self> {
        let path = snapshot_path(root, id);
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(Self::new(path)),
            _ => None,
        }
    }
}

#[async_trait]
impl RecordSource for LocalSnapshotSource {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn resolve(&self, id: SubmissionId) -> Result<Outcome> {
        let bytes = tokio::fs::read(&self.path).await?;
        // Failed captures are stored as empty files
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Outcome::Absent);
        }
        parse_page(&String::from_utf8_lossy(&bytes), PageLayout::Archived, id)
    }
}
