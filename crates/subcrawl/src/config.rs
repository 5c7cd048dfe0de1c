//! Crawler configuration
//!
//! Loaded from a JSON file (`config.json` by default) whose keys are
//! SCREAMING_SNAKE_CASE. Only the keys below are read; anything else in the
//! file is ignored.
//!
//! ```json
//! {
//!   "API_URL": ["https://mirror-a.example", "https://mirror-b.example"],
//!   "LOGIN_COOKIE": {"a": "…", "b": "…"},
//!   "UPLOAD": {"URL": "http://store.example:17985/data/", "KEY": "…"},
//!   "START": 1,
//!   "END": null
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use subcrawl_common::SubmissionId;

use crate::error::{CrawlError, Result};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_DATA_DIR: &str = "data";
/// Where `capture` writes when `SNAPSHOT_DIR` is not set
pub const DEFAULT_SNAPSHOT_DIR: &str = "raw";
pub const DEFAULT_SITE_URL: &str = "https://www.furaffinity.net";
pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_CONGESTION_DELAY_MS: u64 = 4_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 8;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 10_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 300_000;
pub const DEFAULT_RETRY_JITTER_MS: u64 = 1_000;

/// Upload sink for finished batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct UploadConfig {
    /// Base URL; the batch's relative path is appended
    pub url: String,
    /// Sent verbatim as the `Authorization` header
    pub key: String,
}

/// Per-id retry policy settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RetryConfig {
    /// `null` retries forever
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            jitter_ms: DEFAULT_RETRY_JITTER_MS,
        }
    }
}

/// Crawler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CrawlConfig {
    /// Remote API base URL, or a list of mirrors
    #[serde(default, deserialize_with = "one_or_many")]
    pub api_url: Vec<String>,

    /// Session cookies for the live site
    #[serde(default)]
    pub login_cookie: BTreeMap<String, String>,

    #[serde(default)]
    pub upload: Option<UploadConfig>,

    #[serde(default)]
    pub start: Option<SubmissionId>,

    /// Exclusive end bound; unbounded when absent
    #[serde(default)]
    pub end: Option<SubmissionId>,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Directory searched recursively for legacy `batch-*.json` archives
    #[serde(default)]
    pub legacy_dir: Option<PathBuf>,

    /// Root of the captured raw page tree
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,

    #[serde(default = "default_site_url")]
    pub site_url: String,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_congestion_delay_ms")]
    pub congestion_delay_ms: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            api_url: Vec::new(),
            login_cookie: BTreeMap::new(),
            upload: None,
            start: None,
            end: None,
            data_dir: default_data_dir(),
            legacy_dir: None,
            snapshot_dir: None,
            site_url: default_site_url(),
            concurrency: DEFAULT_CONCURRENCY,
            congestion_delay_ms: DEFAULT_CONGESTION_DELAY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry: RetryConfig::default(),
        }
    }
}

impl CrawlConfig {
    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CrawlError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CrawlError::config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(CrawlError::config("CONCURRENCY must be at least 1"));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if end <= start {
                return Err(CrawlError::config(format!(
                    "END ({end}) must be greater than START ({start})"
                )));
            }
        }
        if let Some(upload) = &self.upload {
            url::Url::parse(&upload.url)?;
        }
        for base in &self.api_url {
            url::Url::parse(base)?;
        }
        Ok(())
    }

    pub fn has_remote_api(&self) -> bool {
        !self.api_url.is_empty()
    }

    /// The API base serving `id`: mirrors are chosen by `id mod mirror_count`
    pub fn mirror_for(&self, id: SubmissionId) -> Option<&str> {
        if self.api_url.is_empty() {
            return None;
        }
        let idx = (id % self.api_url.len() as u64) as usize;
        Some(self.api_url[idx].trim_end_matches('/'))
    }

    /// `Cookie` header value built from the session credential map
    pub fn cookie_header(&self) -> Option<String> {
        if self.login_cookie.is_empty() {
            return None;
        }
        Some(
            self.login_cookie
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Snapshot tree used by capture, falling back to [`DEFAULT_SNAPSHOT_DIR`]
    pub fn capture_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR))
    }

    pub fn congestion_delay(&self) -> Duration {
        Duration::from_millis(self.congestion_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_api_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_url = urls.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_login_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.login_cookie.insert(name.into(), value.into());
        self
    }

    pub fn with_upload(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.upload = Some(UploadConfig {
            url: url.into(),
            key: key.into(),
        });
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_legacy_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.legacy_dir = Some(dir.into());
        self
    }

    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    pub fn with_site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = url.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_congestion_delay_ms(mut self, delay_ms: u64) -> Self {
        self.congestion_delay_ms = delay_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_bounds(mut self, start: Option<SubmissionId>, end: Option<SubmissionId>) -> Self {
        self.start = start;
        self.end = end;
        self
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        Missing(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) if url.trim().is_empty() => Vec::new(),
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
        OneOrMany::Missing(()) => Vec::new(),
    })
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_site_url() -> String {
    DEFAULT_SITE_URL.to_string()
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_congestion_delay_ms() -> u64 {
    DEFAULT_CONGESTION_DELAY_MS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_attempts() -> Option<u32> {
    Some(DEFAULT_RETRY_MAX_ATTEMPTS)
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_RETRY_MAX_DELAY_MS
}

fn default_jitter_ms() -> u64 {
    DEFAULT_RETRY_JITTER_MS
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrawlConfig::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.congestion_delay(), Duration::from_secs(4));
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.retry.max_attempts, Some(8));
        assert!(!config.has_remote_api());
        assert!(config.cookie_header().is_none());
    }

    #[test]
    fn test_single_api_url() {
        let config = CrawlConfig::from_json_str(r#"{"API_URL": "https://api.example"}"#).unwrap();
        assert_eq!(config.api_url, vec!["https://api.example".to_string()]);
        assert_eq!(config.mirror_for(12345), Some("https://api.example"));
    }

    #[test]
    fn test_mirror_list_is_chosen_by_modulo() {
        let config = CrawlConfig::from_json_str(
            r#"{"API_URL": ["https://a.example/", "https://b.example", "https://c.example"]}"#,
        )
        .unwrap();
        assert_eq!(config.mirror_for(0), Some("https://a.example"));
        assert_eq!(config.mirror_for(4), Some("https://b.example"));
        assert_eq!(config.mirror_for(5), Some("https://c.example"));
        assert_eq!(config.mirror_for(3), config.mirror_for(300));
    }

    #[test]
    fn test_full_config_file() {
        let config = CrawlConfig::from_json_str(
            r#"{
                "API_URL": "",
                "LOGIN_COOKIE": {"b": "token-b", "a": "token-a"},
                "UPLOAD": {"URL": "http://store.example:17985/data/", "KEY": "secret"},
                "START": 201,
                "END": 1000,
                "RETRY": {"MAX_ATTEMPTS": null, "BASE_DELAY_MS": 50},
                "SOMETHING_ELSE": true
            }"#,
        )
        .unwrap();

        assert!(!config.has_remote_api());
        assert_eq!(config.cookie_header().as_deref(), Some("a=token-a; b=token-b"));
        assert_eq!(config.upload.as_ref().unwrap().key, "secret");
        assert_eq!(config.start, Some(201));
        assert_eq!(config.end, Some(1000));
        assert_eq!(config.retry.max_attempts, None);
        assert_eq!(config.retry.base_delay_ms, 50);
        assert_eq!(config.retry.max_delay_ms, DEFAULT_RETRY_MAX_DELAY_MS);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let err = CrawlConfig::from_json_str(r#"{"START": 500, "END": 100}"#).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(CrawlConfig::from_json_str(r#"{"CONCURRENCY": 0}"#).is_err());
    }
}
