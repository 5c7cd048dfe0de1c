//! Resume point discovery
//!
//! Both trees are sharded by zero-padded numeric directory names, so the most
//! recent work is always under the greatest name at each level.

use std::path::Path;
use subcrawl_common::{parse_batch_file_name, SubmissionId, BATCH_SIZE};
use tracing::debug;

use crate::error::Result;

/// Next id to crawl given the batch tree under `root`: the greatest batch end
/// in the greatest shard. `None` when nothing has been written yet.
pub fn batch_resume_point(root: &Path) -> Result<Option<SubmissionId>> {
    let Some(millions) = max_numeric_dir(root)? else {
        return Ok(None);
    };
    let shard = root.join(format!("{millions:02}"));
    let Some(ten_thousands) = max_numeric_dir(&shard)? else {
        return Ok(None);
    };
    let shard = shard.join(format!("{ten_thousands:02}"));

    let mut latest: Option<SubmissionId> = None;
    for entry in std::fs::read_dir(&shard)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if let Ok((_, end)) = parse_batch_file_name(&entry.file_name().to_string_lossy()) {
            latest = latest.max(Some(end));
        }
    }

    debug!(shard = %shard.display(), resume = ?latest, "Scanned batch tree");
    Ok(latest)
}

/// Next id to capture given the snapshot tree under `root`.
///
/// Capture writes one 100-id bucket at a time, so every bucket below the
/// greatest is complete and the greatest may be partial. Capture restarts at
/// the start of the greatest bucket.
pub fn snapshot_resume_point(root: &Path) -> Result<Option<SubmissionId>> {
    let Some(millions) = max_numeric_dir(root)? else {
        return Ok(None);
    };
    let level = root.join(format!("{millions:02}"));
    let Some(ten_thousands) = max_numeric_dir(&level)? else {
        return Ok(None);
    };
    let level = level.join(format!("{ten_thousands:02}"));
    let Some(bucket) = max_numeric_dir(&level)? else {
        return Ok(None);
    };

    let resume = millions * 1_000_000 + ten_thousands * 10_000 + bucket * BATCH_SIZE;
    debug!(dir = %level.display(), resume, "Scanned snapshot tree");
    Ok(Some(resume))
}

/// Greatest child directory name that parses as a number
fn max_numeric_dir(dir: &Path) -> Result<Option<u64>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut max = None;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(n) = entry.file_name().to_string_lossy().parse::<u64>() {
            max = max.max(Some(n));
        }
    }
    Ok(max)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"{}").unwrap();
    }

    #[test]
    fn test_no_tree_means_no_resume_point() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(batch_resume_point(&dir.path().join("missing")).unwrap(), None);
        assert_eq!(batch_resume_point(dir.path()).unwrap(), None);
        assert_eq!(snapshot_resume_point(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_single_batch() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("00/00/batch-00000000-00000100.json"));
        assert_eq!(batch_resume_point(dir.path()).unwrap(), Some(100));
    }

    #[test]
    fn test_greatest_shard_wins() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("00/99/batch-00990000-00990100.json"));
        touch(&dir.path().join("01/00/batch-01000000-01000100.json"));
        touch(&dir.path().join("01/02/batch-01020000-01020100.json"));
        touch(&dir.path().join("01/02/batch-01020100-01020200.json"));
        touch(&dir.path().join("01/02/batch-01020200-01020300.json.4242.tmp"));
        touch(&dir.path().join("01/02/notes.txt"));
        std::fs::create_dir_all(dir.path().join("logs")).unwrap();

        assert_eq!(batch_resume_point(dir.path()).unwrap(), Some(1_020_200));
    }

    #[test]
    fn test_snapshot_resume_uses_full_id() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("00/00/05/520.html"));
        touch(&dir.path().join("02/03/04/2030400.html"));
        touch(&dir.path().join("02/03/05/2030512.html"));

        assert_eq!(snapshot_resume_point(dir.path()).unwrap(), Some(2_030_500));
    }

    #[test]
    fn test_snapshot_resume_single_bucket() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("00/00/03/301.html"));
        assert_eq!(snapshot_resume_point(dir.path()).unwrap(), Some(300));
    }
}
