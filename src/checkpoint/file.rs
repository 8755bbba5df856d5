//! JSON file backend for [`CheckpointStore`].
//!
//! Commits write `<path>.tmp`, fsync it, then rename it over `<path>`.  A
//! kill at any point leaves either the old file or the new one in place.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Checkpoint, CheckpointStore, StoreError};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    version: u32,
    last_seen_id: Option<String>,
    /// Oldest first.
    notified_ids: IndexSet<String>,
}

pub struct FileCheckpointStore {
    path: PathBuf,
    notified_cap: usize,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, notified_cap: usize) -> Self {
        Self {
            path: path.into(),
            notified_cap,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn corrupt(&self, reason: impl ToString) -> StoreError {
        StoreError::CorruptState {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn write_failure(&self, source: io::Error) -> StoreError {
        StoreError::WriteFailure {
            path: self.path.clone(),
            source,
        }
    }

    fn write_atomically(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.tmp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Checkpoint, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint yet");
                return Ok(Checkpoint::default());
            }
            Err(e) => return Err(self.corrupt(format!("unreadable: {e}"))),
        };

        let file: CheckpointFile = serde_json::from_slice(&bytes).map_err(|e| self.corrupt(e))?;
        if file.version != FORMAT_VERSION {
            return Err(self.corrupt(format!("unsupported format version {}", file.version)));
        }
        if file.last_seen_id.as_deref() == Some("") {
            return Err(self.corrupt("last_seen_id is empty"));
        }

        Ok(Checkpoint::new(file.last_seen_id, file.notified_ids))
    }

    fn commit(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut trimmed = checkpoint.clone();
        trimmed.retain_latest(self.notified_cap);

        let file = CheckpointFile {
            version: FORMAT_VERSION,
            last_seen_id: trimmed.last_seen_id,
            notified_ids: trimmed.notified_ids,
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| self.write_failure(e.into()))?;

        self.write_atomically(&bytes)
            .map_err(|e| self.write_failure(e))?;

        debug!(
            path = %self.path.display(),
            last_seen_id = ?file.last_seen_id,
            notified = file.notified_ids.len(),
            "checkpoint committed"
        );
        Ok(())
    }

    fn notified_cap(&self) -> usize {
        self.notified_cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir, cap: usize) -> FileCheckpointStore {
        FileCheckpointStore::new(dir.path().join("state").join("checkpoint.json"), cap)
    }

    #[test]
    fn missing_file_loads_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 500);
        let c = store.load().unwrap();
        assert!(!c.is_initialized());
        assert_eq!(c.notified_len(), 0);
    }

    #[test]
    fn commit_then_load_restores_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 500);

        let mut c = Checkpoint::default();
        c.set_last_seen_id("acc-3");
        c.mark_notified("acc-1");
        c.mark_notified("acc-2");
        c.mark_notified("acc-3");
        store.commit(&c).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, c);
        assert_eq!(loaded.notified_ids().collect::<Vec<_>>(), ["acc-1", "acc-2", "acc-3"]);
    }

    #[test]
    fn commit_trims_to_cap() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 2);

        let c = Checkpoint::new(
            Some("c".to_string()),
            ["a", "b", "c"].map(String::from),
        );
        store.commit(&c).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.notified_ids().collect::<Vec<_>>(), ["b", "c"]);
    }

    #[test]
    fn commit_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 500);
        store.commit(&Checkpoint::new(Some("x".into()), Vec::new())).unwrap();

        assert!(store.path().exists());
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn stale_temp_file_does_not_affect_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 500);
        store.commit(&Checkpoint::new(Some("good".into()), vec!["good".into()])).unwrap();

        // Simulate a crash half-way through the next commit.
        fs::write(store.tmp_path(), b"{\"version\":1,\"last_se").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.last_seen_id(), Some("good"));
    }

    #[test]
    fn garbage_is_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 500);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::CorruptState { .. }));
        // The bad file is left for the operator.
        assert_eq!(fs::read(store.path()).unwrap(), b"not json");
    }

    #[test]
    fn unknown_version_is_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir, 500);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(
            store.path(),
            br#"{"version":7,"last_seen_id":"a","notified_ids":["a"]}"#,
        )
        .unwrap();

        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }

    #[test]
    fn unwritable_location_is_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let store = FileCheckpointStore::new(blocker.join("checkpoint.json"), 500);

        let err = store.commit(&Checkpoint::new(Some("a".into()), Vec::new())).unwrap_err();
        assert!(matches!(err, StoreError::WriteFailure { .. }));
    }
}
