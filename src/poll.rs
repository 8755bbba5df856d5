//! The poll loop.
//!
//! Each tick fetches the feed, works out what is new, classifies and
//! dispatches it oldest first, and commits the checkpoint after every entry.
//! [`Poller::run`] drives ticks on a fixed interval; tests call
//! [`Poller::tick`] directly.
//!
//! ## For contributors
//!
//! The loop is intentionally sequential: one tick finishes, commits
//! included, before the next one starts.  A failed fetch is not retried
//! within the tick; the fixed interval is the retry policy.

use std::future::Future;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, StoreError};
use crate::classify::Classifier;
use crate::delta::{compute_delta, Delta, DeltaKind};
use crate::notify::Dispatcher;
use crate::source::{DataSource, FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// No checkpoint yet; the next non-empty fetch is recorded silently.
    Uninitialized,
    Steady,
}

/// Counters for one processed tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickStats {
    pub fetched: usize,
    pub new: usize,
    pub dispatched: usize,
    pub irrelevant: usize,
    pub already_notified: usize,
    /// Entries whose send failed; left unmarked and retried next tick.
    pub dispatch_failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Fetch failed or timed out; nothing changed.
    FetchFailed,
    /// First run: `recorded` ids stored without notifying.
    Bootstrapped { recorded: usize },
    Processed(TickStats),
}

pub struct Poller {
    source: Box<dyn DataSource>,
    classifier: Box<dyn Classifier>,
    dispatcher: Dispatcher,
    store: Box<dyn CheckpointStore>,
    /// Mirror of the last successful commit.
    checkpoint: Checkpoint,
    fetch_timeout: Duration,
}

impl Poller {
    /// Loads the checkpoint; a corrupt one is returned as an error rather
    /// than replaced.
    pub fn new(
        source: Box<dyn DataSource>,
        classifier: Box<dyn Classifier>,
        dispatcher: Dispatcher,
        store: Box<dyn CheckpointStore>,
        fetch_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let checkpoint = store.load()?;
        info!(
            source = source.name(),
            last_seen_id = ?checkpoint.last_seen_id(),
            notified = checkpoint.notified_len(),
            "checkpoint loaded"
        );
        Ok(Self {
            source,
            classifier,
            dispatcher,
            store,
            checkpoint,
            fetch_timeout,
        })
    }

    pub fn state(&self) -> PollState {
        if self.checkpoint.is_initialized() {
            PollState::Steady
        } else {
            PollState::Uninitialized
        }
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Run one poll-fetch-classify-notify-commit cycle.
    ///
    /// Only a failed commit is returned as an error; fetch and dispatch
    /// failures are logged and reflected in the outcome.
    pub async fn tick(&mut self) -> Result<TickOutcome, StoreError> {
        let source = self.source.name();
        let fetched = match tokio::time::timeout(self.fetch_timeout, self.source.fetch())
            .await
            .unwrap_or_else(|_| Err(FetchError::Timeout(self.fetch_timeout)))
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(source, error = %e, "fetch failed; skipping tick");
                return Ok(TickOutcome::FetchFailed);
            }
        };
        debug!(source, fetched = fetched.len(), "feed fetched");

        let delta = compute_delta(&fetched, &self.checkpoint);
        if delta.is_bootstrap() {
            return self.bootstrap(delta);
        }
        match delta.kind {
            DeltaKind::Rotated => warn!(
                source,
                last_seen_id = ?self.checkpoint.last_seen_id(),
                catching_up = delta.entries.len(),
                "checkpoint id no longer in feed; treating every fetched entry as new"
            ),
            DeltaKind::Stale => warn!(
                source,
                last_seen_id = ?self.checkpoint.last_seen_id(),
                freshest = ?fetched.first().map(|e| e.id()),
                "feed is behind the checkpoint; last seen id kept"
            ),
            DeltaKind::Bootstrap | DeltaKind::Incremental => {}
        }

        let mut stats = TickStats {
            fetched: fetched.len(),
            new: delta.entries.len(),
            ..TickStats::default()
        };

        // Freshest entry with nothing unfinished at or before it.  Once a
        // send fails, `last_seen_id` may not pass that entry.
        let mut settled: Option<&str> = None;

        for entry in &delta.entries {
            if self.checkpoint.has_notified(entry.id()) {
                stats.already_notified += 1;
                if stats.dispatch_failed == 0 {
                    settled = Some(entry.id());
                }
                continue;
            }

            if self.classifier.is_relevant(entry.title()) {
                let message = self.dispatcher.format(entry);
                if self.dispatcher.dispatch(&message).await.is_err() {
                    // Unmarked, so the next tick offers it again; later
                    // entries still go out.
                    stats.dispatch_failed += 1;
                    continue;
                }
                info!(entry_id = entry.id(), title = entry.title(), "notified");
                stats.dispatched += 1;
            } else {
                debug!(entry_id = entry.id(), title = entry.title(), "not relevant");
                stats.irrelevant += 1;
            }

            self.commit_with(|c| c.mark_notified(entry.id()))?;
            if stats.dispatch_failed == 0 {
                settled = Some(entry.id());
            }
        }

        let advance_to = match delta.new_last_seen_id {
            Some(id) if stats.dispatch_failed == 0 => Some(id),
            Some(_) => {
                warn!(
                    failed = stats.dispatch_failed,
                    held_at = ?settled.or(self.checkpoint.last_seen_id()),
                    "dispatch failed; last seen id held before the first failure"
                );
                settled.map(str::to_owned)
            }
            None => None,
        };
        if let Some(id) = advance_to {
            if self.checkpoint.last_seen_id() != Some(id.as_str()) {
                self.commit_with(|c| c.set_last_seen_id(id))?;
            }
        }

        debug!(?stats, "tick complete");
        Ok(TickOutcome::Processed(stats))
    }

    /// Drive [`tick`](Self::tick) every `interval` until `shutdown` resolves.
    ///
    /// The first tick fires immediately.  Shutdown is only observed between
    /// ticks, so a tick in progress always finishes its commits.
    pub async fn run<F>(mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(source = self.source.name(), ?interval, state = ?self.state(), "poll loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.tick().await {
                error!(error = %e, "tick aborted");
            }
        }
        info!("poll loop stopped");
    }

    fn bootstrap(&mut self, delta: Delta) -> Result<TickOutcome, StoreError> {
        let Some(last_seen) = delta.new_last_seen_id else {
            debug!("feed empty; bootstrap postponed");
            return Ok(TickOutcome::Bootstrapped { recorded: 0 });
        };

        let recorded = delta.entries.len();
        self.commit_with(|c| {
            for entry in &delta.entries {
                c.mark_notified(entry.id());
            }
            c.set_last_seen_id(last_seen);
        })?;
        info!(
            recorded,
            last_seen_id = ?self.checkpoint.last_seen_id(),
            "bootstrap complete; existing filings recorded without notifying"
        );
        Ok(TickOutcome::Bootstrapped { recorded })
    }

    /// Apply `change` to a copy, commit it, and only then adopt it.  A failed
    /// commit leaves the in-memory checkpoint as it was.
    fn commit_with(&mut self, change: impl FnOnce(&mut Checkpoint)) -> Result<(), StoreError> {
        let mut next = self.checkpoint.clone();
        change(&mut next);
        next.retain_latest(self.store.notified_cap());

        if let Err(e) = self.store.commit(&next) {
            error!(error = %e, "checkpoint commit failed");
            return Err(e);
        }
        self.checkpoint = next;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
