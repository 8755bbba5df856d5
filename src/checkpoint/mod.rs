//! Durable processing progress.
//!
//! A [`Checkpoint`] records the freshest entry id seen so far and the ids
//! that have already been handled.  The [`CheckpointStore`] trait hides where
//! it lives: [`FileCheckpointStore`] is the production backend, and tests use
//! an in-memory store.
//!
//! ## Retention
//!
//! `notified_ids` is bounded.  When it grows past the cap the oldest ids are
//! evicted first.  A very old filing that re-appears in the feed after its id
//! was evicted will be notified again; this is accepted, and the cap is
//! configurable for deployments that want a longer memory.

mod file;
#[cfg(test)]
mod memory;

pub use file::FileCheckpointStore;
#[cfg(test)]
pub use memory::MemoryCheckpointStore;

use std::path::PathBuf;

use indexmap::IndexSet;

/// Default bound on `notified_ids`.
pub const DEFAULT_NOTIFIED_CAP: usize = 500;

/// Errors surfaced by a [`CheckpointStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Stored state exists but cannot be read back.  Never silently reset.
    #[error("checkpoint at {path} is corrupt: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// A commit did not reach durable storage; the previous state is intact.
    #[error("failed to write checkpoint to {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Processing progress: last seen id plus the bounded set of handled ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    last_seen_id: Option<String>,
    /// Insertion ordered, oldest first.
    notified_ids: IndexSet<String>,
}

impl Checkpoint {
    pub fn new(last_seen_id: Option<String>, notified_ids: impl IntoIterator<Item = String>) -> Self {
        Self {
            last_seen_id: last_seen_id.filter(|id| !id.is_empty()),
            notified_ids: notified_ids.into_iter().collect(),
        }
    }

    /// `false` until the first bootstrap has recorded a last seen id.
    pub fn is_initialized(&self) -> bool {
        self.last_seen_id.is_some()
    }

    pub fn last_seen_id(&self) -> Option<&str> {
        self.last_seen_id.as_deref()
    }

    pub fn set_last_seen_id(&mut self, id: impl Into<String>) {
        self.last_seen_id = Some(id.into());
    }

    pub fn has_notified(&self, id: &str) -> bool {
        self.notified_ids.contains(id)
    }

    /// Record `id` as handled.  An id already present keeps its position.
    pub fn mark_notified(&mut self, id: impl Into<String>) {
        self.notified_ids.insert(id.into());
    }

    /// Oldest first.
    pub fn notified_ids(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.notified_ids.iter().map(String::as_str)
    }

    pub fn notified_len(&self) -> usize {
        self.notified_ids.len()
    }

    /// Evict the oldest ids until at most `cap` remain.
    pub fn retain_latest(&mut self, cap: usize) {
        let len = self.notified_ids.len();
        if len > cap {
            self.notified_ids.drain(..len - cap);
        }
    }
}

/// Persistence for a single [`Checkpoint`].
///
/// Single writer.  Implementations must make `commit` all-or-nothing: a
/// reader (or a restarted process) sees either the previous checkpoint or
/// the new one, never a mix.
pub trait CheckpointStore: Send + Sync {
    /// Last committed checkpoint, or an uninitialised one if nothing was
    /// ever stored.
    fn load(&self) -> Result<Checkpoint, StoreError>;

    /// Persist both fields together, trimming `notified_ids` to the store's
    /// cap on the way.
    fn commit(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// Bound applied to `notified_ids` on commit.
    fn notified_cap(&self) -> usize;
}
