//! Legacy batch archives
//!
//! Files from the first crawler generation, named `batch-S-E.json` with an
//! inclusive end and one `{data, comments}` entry per id. Ranges are taken
//! from file names once at startup; bodies are parsed lazily through a
//! single-slot cache.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use subcrawl_common::{parse_batch_file_name, Outcome, SubmissionId};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::submission::{is_empty_payload, ApiSubmission};
use super::RecordSource;
use crate::cache::FileSlot;
use crate::error::{CrawlError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyEntry {
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub comments: Vec<serde_json::Value>,
}

type LegacyFile = HashMap<String, LegacyEntry>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRange {
    pub start: SubmissionId,
    /// Inclusive
    pub end: SubmissionId,
    pub path: PathBuf,
}

impl LegacyRange {
    pub fn contains(&self, id: SubmissionId) -> bool {
        (self.start..=self.end).contains(&id)
    }
}

pub struct LegacyArchive {
    ranges: Vec<LegacyRange>,
    cache: FileSlot<LegacyFile>,
}

impl LegacyArchive {
    pub fn empty() -> Self {
        Self::from_ranges(Vec::new())
    }

    pub fn from_ranges(mut ranges: Vec<LegacyRange>) -> Self {
        ranges.sort_by_key(|r| r.start);
        Self {
            ranges,
            cache: FileSlot::new("legacy"),
        }
    }

    /// Collect the ranges of every `*.json` file below `dir`.
    ///
    /// A file whose name does not encode a valid range aborts discovery.
    pub fn discover(dir: &Path) -> Result<Self> {
        let mut ranges = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(std::io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("json")
            {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let (start, end) =
                parse_batch_file_name(&name).map_err(|e| CrawlError::LegacyRange {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            debug!(start, end, path = %path.display(), "Found legacy archive");
            ranges.push(LegacyRange {
                start,
                end,
                path: path.to_path_buf(),
            });
        }

        info!(dir = %dir.display(), files = ranges.len(), "Discovered legacy archives");
        Ok(Self::from_ranges(ranges))
    }

    pub fn ranges(&self) -> &[LegacyRange] {
        &self.ranges
    }

    pub fn covering(&self, id: SubmissionId) -> Option<&LegacyRange> {
        self.ranges.iter().find(|r| r.contains(id))
    }

    /// The archived entry for `id`, if a range covers it and the file has one
    pub async fn entry(&self, id: SubmissionId) -> Result<Option<LegacyEntry>> {
        let Some(range) = self.covering(id) else {
            return Ok(None);
        };
        let file = self
            .cache
            .get_or_load(&range.path, |bytes| {
                Ok(serde_json::from_slice::<LegacyFile>(bytes)?)
            })
            .await?;
        Ok(file.get(&id.to_string()).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct LegacyArchiveSource {
    entry: LegacyEntry,
}

impl LegacyArchiveSource {
    pub fn new(entry: LegacyEntry) -> Self {
        Self { entry }
    }
}

#[async_trait]
impl RecordSource for LegacyArchiveSource {
    fn name(&self) -> &'static str {
        "legacy"
    }

    async fn resolve(&self, id: SubmissionId) -> Result<Outcome> {
        if is_empty_payload(&self.entry.data) {
            return Ok(Outcome::Absent);
        }
        let submission = ApiSubmission::from_value(self.entry.data.clone())?;
        Ok(Outcome::Found(submission.into_record(id)?))
    }
}
