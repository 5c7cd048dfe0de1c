//! Batch persistence
//!
//! Batches live under `{data_dir}/{millions:02}/{ten_thousands:02}/batch-S-E.json`.
//! Saving is destination-exclusive: with an upload sink configured the batch
//! is POSTed there and nothing is written locally.

use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subcrawl_common::{BatchFile, BatchRange, Outcome, SubmissionId};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::cache::FileSlot;
use crate::config::UploadConfig;
use crate::error::{CrawlError, Result};

/// Remote sink receiving finished batches
#[derive(Debug, Clone)]
pub struct UploadSink {
    client: Client,
    base: url::Url,
    key: String,
}

impl UploadSink {
    pub fn new(client: Client, config: &UploadConfig) -> Result<Self> {
        let mut base = url::Url::parse(&config.url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            client,
            base,
            key: config.key.clone(),
        })
    }

    /// Destination URL for a batch: the base with the batch's relative path appended
    pub fn url_for(&self, range: BatchRange) -> Result<url::Url> {
        Ok(self.base.join(&range.relative_url_path())?)
    }

    async fn upload(&self, range: BatchRange, body: &[u8]) -> Result<()> {
        let url = self.url_for(range)?;
        let response = self
            .client
            .post(url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CrawlError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

pub struct BatchStore {
    root: PathBuf,
    upload: Option<UploadSink>,
    cache: FileSlot<BatchFile>,
}

impl BatchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            upload: None,
            cache: FileSlot::new("batch"),
        }
    }

    pub fn with_upload(mut self, sink: UploadSink) -> Self {
        self.upload = Some(sink);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, range: BatchRange) -> PathBuf {
        self.root.join(range.relative_path())
    }

    pub async fn exists(&self, range: BatchRange) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(range)).await?)
    }

    /// Load a stored batch, or `None` if it has not been written.
    ///
    /// A file that does not parse (cut short by a crash mid-write) counts as
    /// not written, so the batch is fetched again and replaced.
    pub async fn load(&self, range: BatchRange) -> Result<Option<Arc<BatchFile>>> {
        if !self.exists(range).await? {
            return Ok(None);
        }
        let path = self.path_for(range);
        let loaded = self
            .cache
            .get_or_load(&path, |bytes| Ok(serde_json::from_slice::<BatchFile>(bytes)?))
            .await;

        match loaded {
            Ok(batch) => Ok(Some(batch)),
            Err(CrawlError::Serialization(e)) => {
                warn!(
                    batch = %range,
                    path = %path.display(),
                    error = %e,
                    "Unreadable batch file, treating as missing"
                );
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    /// Stored outcome for a single id, if its batch exists and has an entry
    pub async fn lookup(&self, id: SubmissionId) -> Result<Option<Outcome>> {
        let range = BatchRange::containing(id);
        Ok(self
            .load(range)
            .await?
            .and_then(|batch| batch.get(&id).cloned()))
    }

    /// Whether the stored batch has an outcome for every id in range
    pub async fn is_complete(&self, range: BatchRange) -> Result<bool> {
        Ok(match self.load(range).await? {
            Some(batch) => range.ids().all(|id| batch.contains_key(&id)),
            None => false,
        })
    }

    /// Persist a complete batch
    pub async fn save(&self, range: BatchRange, batch: &BatchFile) -> Result<()> {
        if let Some(missing) = range.ids().find(|id| !batch.contains_key(id)) {
            return Err(CrawlError::IncompleteBatch {
                range,
                reason: format!("no outcome for {missing}"),
            });
        }
        if let Some(stray) = batch.keys().find(|id| !range.contains(**id)) {
            return Err(CrawlError::IncompleteBatch {
                range,
                reason: format!("{stray} is out of range"),
            });
        }

        let body = serde_json::to_vec(batch)?;

        match &self.upload {
            Some(sink) => {
                sink.upload(range, &body).await?;
                info!(batch = %range, bytes = body.len(), "Uploaded batch");
            }
            None => {
                let path = self.path_for(range);
                write_atomic(&path, &body).await?;
                self.cache.invalidate(&path).await;
                info!(batch = %range, path = %path.display(), "Saved batch");
            }
        }
        Ok(())
    }
}

/// Write `bytes` to `path` via a temporary sibling and rename, creating
/// parent directories as needed.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| CrawlError::config(format!("{} has no parent", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".{}.tmp", std::process::id()));
    let tmp_path = parent.join(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote file");
    Ok(())
}
