//! Batch addressing
//!
//! A batch is the half-open range `[start, start + BATCH_SIZE)`. Its file name
//! and shard directory are pure functions of `start`.

use regex::Regex;
use std::ops::Range;
use std::path::PathBuf;
use std::sync::LazyLock;

use super::SubmissionId;
use crate::error::{CommonError, Result};

/// Number of submissions per batch file
pub const BATCH_SIZE: u64 = 100;

#[allow(clippy::unwrap_used)]
static BATCH_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^batch-(\d{8,})-(\d{8,})\.json$").unwrap());

/// Aligned batch of submission ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchRange {
    start: SubmissionId,
}

impl BatchRange {
    /// The batch covering `id`
    pub fn containing(id: SubmissionId) -> Self {
        Self {
            start: (id / BATCH_SIZE) * BATCH_SIZE,
        }
    }

    pub fn start(&self) -> SubmissionId {
        self.start
    }

    /// Exclusive end
    pub fn end(&self) -> SubmissionId {
        self.start + BATCH_SIZE
    }

    pub fn contains(&self, id: SubmissionId) -> bool {
        self.ids().contains(&id)
    }

    pub fn ids(&self) -> Range<SubmissionId> {
        self.start..self.end()
    }

    pub fn next(&self) -> Self {
        Self { start: self.end() }
    }

    /// `batch-{start:08}-{end:08}.json`
    pub fn file_name(&self) -> String {
        format!("batch-{:08}-{:08}.json", self.start, self.end())
    }

    /// Two-level shard directory (millions, then ten-thousands)
    pub fn shard_dir(&self) -> PathBuf {
        let (millions, ten_thousands) = shard_digits(self.start);
        PathBuf::from(format!("{millions:02}")).join(format!("{ten_thousands:02}"))
    }

    /// Shard directory plus file name, relative to a data root
    pub fn relative_path(&self) -> PathBuf {
        self.shard_dir().join(self.file_name())
    }

    /// Forward-slash form of [`relative_path`](Self::relative_path), used in URLs
    pub fn relative_url_path(&self) -> String {
        let (millions, ten_thousands) = shard_digits(self.start);
        format!("{millions:02}/{ten_thousands:02}/{}", self.file_name())
    }
}

impl std::fmt::Display for BatchRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}

fn shard_digits(start: SubmissionId) -> (u64, u64) {
    (start / 1_000_000, (start % 1_000_000) / 10_000)
}

/// Extract the two ids embedded in a `batch-XXXXXXXX-YYYYYYYY.json` file name.
///
/// Interpretation of the second id (exclusive or inclusive end) is up to the
/// caller: current batches use an exclusive end, legacy archives an inclusive one.
pub fn parse_batch_file_name(name: &str) -> Result<(SubmissionId, SubmissionId)> {
    let captures = BATCH_NAME
        .captures(name)
        .ok_or_else(|| CommonError::InvalidBatchName(name.to_string()))?;

    let parse = |idx: usize| {
        captures[idx]
            .parse::<SubmissionId>()
            .map_err(|e| CommonError::InvalidBatchName(format!("{name}: {e}")))
    };

    let start = parse(1)?;
    let end = parse(2)?;
    if end < start {
        return Err(CommonError::InvalidBatchName(format!(
            "{name}: end {end} precedes start {start}"
        )));
    }
    Ok((start, end))
}
