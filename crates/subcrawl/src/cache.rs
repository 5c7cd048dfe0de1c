//! Single-slot parsed file cache
//!
//! Batches are resolved roughly in id order, so every worker in a batch wants
//! the same underlying file. Each file category (stored batches, legacy
//! archives) gets one slot holding the most recently parsed file. The slot's
//! lock is held across the read and parse, so concurrent workers asking for
//! the same path parse it once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;

pub struct FileSlot<T> {
    name: &'static str,
    slot: Mutex<Option<(PathBuf, Arc<T>)>>,
}

impl<T> FileSlot<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
        }
    }

    /// Return the parsed contents of `path`, reading and parsing it with
    /// `parse` unless it is the file currently held in the slot.
    pub async fn get_or_load<F>(&self, path: &Path, parse: F) -> Result<Arc<T>>
    where
        F: FnOnce(&[u8]) -> Result<T>,
    {
        let mut slot = self.slot.lock().await;
        if let Some((cached_path, value)) = slot.as_ref() {
            if cached_path == path {
                return Ok(Arc::clone(value));
            }
        }

        let bytes = tokio::fs::read(path).await?;
        let value = Arc::new(parse(&bytes)?);
        debug!(cache = self.name, path = %path.display(), "Loaded file into cache slot");
        *slot = Some((path.to_path_buf(), Arc::clone(&value)));
        Ok(value)
    }

    /// Drop the cached entry if it holds `path`
    pub async fn invalidate(&self, path: &Path) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|(cached, _)| cached == path) {
            *slot = None;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_path_parsed_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let slot: Arc<FileSlot<String>> = Arc::new(FileSlot::new("test"));
        let parses = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let slot = Arc::clone(&slot);
            let parses = Arc::clone(&parses);
            let path = path.clone();
            handles.push(tokio::spawn(async move {
                slot.get_or_load(&path, |bytes| {
                    parses.fetch_add(1, Ordering::SeqCst);
                    Ok(String::from_utf8_lossy(bytes).into_owned())
                })
                .await
                .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().as_str(), "hello");
        }
        assert_eq!(parses.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_path_replaces_and_invalidate_forces_reload() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");
        std::fs::write(&first, b"one").unwrap();
        std::fs::write(&second, b"two").unwrap();

        let slot: FileSlot<String> = FileSlot::new("test");
        let read = |b: &[u8]| -> Result<String> { Ok(String::from_utf8_lossy(b).into_owned()) };

        assert_eq!(slot.get_or_load(&first, read).await.unwrap().as_str(), "one");
        assert_eq!(slot.get_or_load(&second, read).await.unwrap().as_str(), "two");

        std::fs::write(&second, b"three").unwrap();
        assert_eq!(slot.get_or_load(&second, read).await.unwrap().as_str(), "two");
        slot.invalidate(&second).await;
        assert_eq!(slot.get_or_load(&second, read).await.unwrap().as_str(), "three");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let slot: FileSlot<String> = FileSlot::new("test");
        let result = slot
            .get_or_load(&dir.path().join("nope"), |_| Ok(String::new()))
            .await;
        assert!(result.is_err());
    }
}
