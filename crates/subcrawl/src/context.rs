//! Shared state for one run

use reqwest::Client;
use std::sync::Arc;

use crate::config::CrawlConfig;
use crate::error::Result;
use crate::governor::RateGovernor;
use crate::retry::RetryPolicy;
use crate::store::{BatchStore, UploadSink};

const USER_AGENT: &str = concat!("subcrawl/", env!("CARGO_PKG_VERSION"));

/// Configuration, HTTP client, rate governor and batch store, built once
/// and handed to every component that needs them
#[derive(Clone)]
pub struct CrawlContext {
    pub config: Arc<CrawlConfig>,
    pub client: Client,
    pub governor: Arc<RateGovernor>,
    pub store: Arc<BatchStore>,
}

impl CrawlContext {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()?;

        let mut store = BatchStore::new(&config.data_dir);
        if let Some(upload) = &config.upload {
            store = store.with_upload(UploadSink::new(client.clone(), upload)?);
        }

        Ok(Self {
            governor: Arc::new(RateGovernor::new(config.congestion_delay())),
            store: Arc::new(store),
            client,
            config: Arc::new(config),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.config.retry)
    }
}
