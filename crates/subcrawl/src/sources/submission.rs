//! Structured submission payloads
//!
//! The remote API and the legacy archives share one JSON shape for a
//! submission. Only the fields needed for a [`Record`] are read.

use serde::Deserialize;
use subcrawl_common::types::iso_timestamp_from_rfc3339;
use subcrawl_common::{Record, SubmissionId};

use crate::error::{CrawlError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSubmission {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub profile_name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub posted_at: String,
    pub rating: String,
    pub download: String,
}

impl ApiSubmission {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| CrawlError::parse(format!("unexpected submission payload: {e}")))
    }

    pub fn into_record(self, id: SubmissionId) -> Result<Record> {
        Ok(Record {
            id,
            username: self.profile_name,
            title: self.title,
            description: self.description.trim().to_string(),
            keywords: self.keywords,
            timestamp: iso_timestamp_from_rfc3339(&self.posted_at)?,
            rating: self.rating,
            download_url: scheme_qualify(&self.download),
        })
    }
}

/// Turn a scheme-relative `//host/path` link into `https://host/path`
pub fn scheme_qualify(link: &str) -> String {
    let link = link.trim();
    match link.strip_prefix("//") {
        Some(rest) => format!("https://{rest}"),
        None => link.to_string(),
    }
}

/// True for `{}` and `null`, the placeholders used for missing submissions
pub fn is_empty_payload(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
