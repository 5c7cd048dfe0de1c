//! Remote structured API
//!
//! `GET {base}/submission/{id}.json` returns the structured record; any
//! non-2xx answer means the submission is gone. `GET {base}/status.json`
//! reports how many registered users are online.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use subcrawl_common::{Outcome, SubmissionId};
use tracing::{debug, warn};

use super::submission::{is_empty_payload, ApiSubmission};
use super::RecordSource;
use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use crate::governor::congestion_from_online;

#[derive(Debug, Deserialize)]
struct StatusResponse {
    online: OnlineCounts,
}

#[derive(Debug, Deserialize)]
struct OnlineCounts {
    registered: u64,
}

/// Client for the API mirrors
#[derive(Debug, Clone)]
pub struct RemoteApi {
    client: Client,
    config: Arc<CrawlConfig>,
}

impl RemoteApi {
    /// `None` when no API base URL is configured
    pub fn from_config(client: Client, config: Arc<CrawlConfig>) -> Option<Self> {
        config
            .has_remote_api()
            .then(|| Self { client, config })
    }

    pub fn mirror_for(&self, id: SubmissionId) -> Result<&str> {
        self.config
            .mirror_for(id)
            .ok_or_else(|| CrawlError::config("API_URL is not configured"))
    }

    /// Fetch the structured submission; `Absent` on non-2xx or an empty body
    pub async fn submission(&self, id: SubmissionId) -> Result<Outcome> {
        let url = format!("{}/submission/{id}.json", self.mirror_for(id)?);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            debug!(id, status = response.status().as_u16(), "Submission not served by API");
            return Ok(Outcome::Absent);
        }

        let value: serde_json::Value = response.json().await?;
        if is_empty_payload(&value) {
            return Ok(Outcome::Absent);
        }
        Ok(Outcome::Found(ApiSubmission::from_value(value)?.into_record(id)?))
    }

    /// Registered users online as reported by the mirror serving `id`
    pub async fn registered_online(&self, id: SubmissionId) -> Result<u64> {
        let url = format!("{}/status.json", self.mirror_for(id)?);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        let status: StatusResponse = response.json().await?;
        Ok(status.online.registered)
    }
}

pub struct RemoteApiSource {
    api: RemoteApi,
    congestion: OnceLock<bool>,
}

impl RemoteApiSource {
    pub fn new(api: RemoteApi) -> Self {
        Self {
            api,
            congestion: OnceLock::new(),
        }
    }
}

#[async_trait]
impl RecordSource for RemoteApiSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn resolve(&self, id: SubmissionId) -> Result<Outcome> {
        let outcome = self.api.submission(id).await?;

        match self.api.registered_online(id).await {
            Ok(registered) => {
                let _ = self.congestion.set(congestion_from_online(registered));
            }
            Err(e) => warn!(id, error = %e, "Could not read API status"),
        }
        Ok(outcome)
    }

    fn congestion_signal(&self) -> Option<bool> {
        self.congestion.get().copied()
    }
}
