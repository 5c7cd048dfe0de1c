//! Common types used across subcrawl

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CommonError, Result};

mod batch;

pub use batch::{parse_batch_file_name, BatchRange, BATCH_SIZE};

/// Dense integer key addressing one submission
pub type SubmissionId = u64;

/// Contents of one persisted batch file, keyed by submission id
pub type BatchFile = BTreeMap<SubmissionId, Outcome>;

/// Normalized submission record
///
/// The serialized field names (`date`, `filename`) match the batch files
/// already on disk and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: SubmissionId,
    pub username: String,
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
    /// ISO-8601 timestamp in UTC
    #[serde(rename = "date")]
    pub timestamp: String,
    /// Rating category, passed through as reported
    pub rating: String,
    #[serde(rename = "filename")]
    pub download_url: String,
}

/// Resolution of a single submission id
///
/// Serialized as the record object, or `null` when the submission exists in
/// the id space but has no retrievable content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Record>", into = "Option<Record>")]
pub enum Outcome {
    Found(Record),
    /// Withdrawn, private or deleted
    Absent,
}

impl Outcome {
    pub fn is_absent(&self) -> bool {
        matches!(self, Outcome::Absent)
    }

    pub fn record(&self) -> Option<&Record> {
        match self {
            Outcome::Found(record) => Some(record),
            Outcome::Absent => None,
        }
    }
}

impl From<Option<Record>> for Outcome {
    fn from(value: Option<Record>) -> Self {
        match value {
            Some(record) => Outcome::Found(record),
            None => Outcome::Absent,
        }
    }
}

impl From<Outcome> for Option<Record> {
    fn from(value: Outcome) -> Self {
        match value {
            Outcome::Found(record) => Some(record),
            Outcome::Absent => None,
        }
    }
}

/// Normalize an RFC 3339 timestamp (any offset) to UTC ISO-8601 with second precision
pub fn iso_timestamp_from_rfc3339(value: &str) -> Result<String> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| format_utc(dt.with_timezone(&Utc)))
        .map_err(|e| CommonError::InvalidTimestamp(format!("{value}: {e}")))
}

/// Normalize a unix timestamp in seconds to UTC ISO-8601
pub fn iso_timestamp_from_unix(secs: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(format_utc)
        .ok_or_else(|| CommonError::InvalidTimestamp(format!("unix seconds out of range: {secs}")))
}

pub fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
