//! In-memory [`CheckpointStore`] for tests.

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{Checkpoint, CheckpointStore, StoreError};

#[derive(Default)]
struct Inner {
    committed: Option<Checkpoint>,
    commits: usize,
    fail_writes: bool,
}

/// Clones share the same backing state, so a test can keep a handle while
/// the poller owns another.
#[derive(Clone)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Inner>>,
    notified_cap: usize,
}

impl MemoryCheckpointStore {
    pub fn new(notified_cap: usize) -> Self {
        Self {
            inner: Arc::default(),
            notified_cap,
        }
    }

    /// Last committed checkpoint, if any.
    pub fn committed(&self) -> Option<Checkpoint> {
        self.inner.lock().unwrap().committed.clone()
    }

    /// Number of successful commits so far.
    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }

    /// Make every following commit fail with `WriteFailure`.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Checkpoint, StoreError> {
        Ok(self.committed().unwrap_or_default())
    }

    fn commit(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_writes {
            return Err(StoreError::WriteFailure {
                path: PathBuf::from("memory"),
                source: io::Error::other("injected write failure"),
            });
        }
        let mut trimmed = checkpoint.clone();
        trimmed.retain_latest(self.notified_cap);
        inner.committed = Some(trimmed);
        inner.commits += 1;
        Ok(())
    }

    fn notified_cap(&self) -> usize {
        self.notified_cap
    }
}
