//! Live site pages
//!
//! `GET {site}/view/{id}/`, optionally with the session cookie. The
//! authenticated source parses the current page design; snapshot capture
//! stores the raw bytes.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::sync::{Arc, OnceLock};
use subcrawl_common::{Outcome, SubmissionId};
use tracing::debug;

use super::layout::{parse_online_registered, parse_page, PageLayout};
use super::RecordSource;
use crate::error::{CrawlError, Result};
use crate::governor::congestion_from_online;

#[derive(Debug, Clone)]
pub struct SiteClient {
    client: Client,
    base: String,
    cookie: Option<String>,
}

impl SiteClient {
    pub fn new(client: Client, base: impl Into<String>, cookie: Option<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            client,
            base,
            cookie,
        }
    }

    pub fn page_url(&self, id: SubmissionId) -> String {
        format!("{}/view/{id}/", self.base)
    }

    /// Request the page for `id`; the status is left to the caller
    pub async fn get(&self, id: SubmissionId) -> Result<Response> {
        let mut request = self.client.get(self.page_url(id));
        if let Some(cookie) = &self.cookie {
            request = request.header(reqwest::header::COOKIE, cookie);
        }
        Ok(request.send().await?)
    }
}

pub struct AuthenticatedSiteSource {
    site: Arc<SiteClient>,
    congestion: OnceLock<bool>,
}

impl AuthenticatedSiteSource {
    pub fn new(site: Arc<SiteClient>) -> Self {
        Self {
            site,
            congestion: OnceLock::new(),
        }
    }
}

#[async_trait]
impl RecordSource for AuthenticatedSiteSource {
    fn name(&self) -> &'static str {
        "site"
    }

    async fn resolve(&self, id: SubmissionId) -> Result<Outcome> {
        let response = self.site.get(id).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!(id, "Live page not found");
            return Ok(Outcome::Absent);
        }
        if !status.is_success() {
            return Err(CrawlError::Status {
                status: status.as_u16(),
                url: self.site.page_url(id),
            });
        }

        let html = response.text().await?;
        if let Some(registered) = parse_online_registered(&html) {
            let _ = self.congestion.set(congestion_from_online(registered));
        }
        parse_page(&html, PageLayout::Live, id)
    }

    fn congestion_signal(&self) -> Option<bool> {
        self.congestion.get().copied()
    }
}
