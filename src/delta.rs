//! New-entry detection.
//!
//! Given a fresh fetch (newest first) and the current [`Checkpoint`], work
//! out which entries have not been seen yet and in what order they must be
//! delivered.  Pure: no I/O, no clock.

use std::collections::HashSet;

use crate::checkpoint::Checkpoint;
use crate::source::FeedEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaKind {
    /// No checkpoint yet.  `entries` are history to record, not to notify.
    Bootstrap,
    /// `entries` are new since the checkpoint.
    Incremental,
    /// The checkpoint id is no longer in the feed; every fetched entry is
    /// treated as new.  Anything that rotated out between polls is lost.
    Rotated,
    /// The checkpoint id is missing but the freshest fetched entry was
    /// already handled: the fetch lags behind what was seen before.  Entries
    /// are still offered for processing; `last_seen_id` stays put.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub kind: DeltaKind,
    /// Oldest first.
    pub entries: Vec<FeedEntry>,
    /// Freshest fetched id, only when it differs from the checkpoint.
    pub new_last_seen_id: Option<String>,
}

impl Delta {
    pub fn is_bootstrap(&self) -> bool {
        self.kind == DeltaKind::Bootstrap
    }
}

/// Compute the entries to process for this tick.
///
/// Duplicate ids within `fetched` keep their first occurrence.
pub fn compute_delta(fetched: &[FeedEntry], checkpoint: &Checkpoint) -> Delta {
    let mut seen = HashSet::with_capacity(fetched.len());
    let fetched: Vec<&FeedEntry> = fetched.iter().filter(|e| seen.insert(e.id())).collect();

    let freshest = fetched.first().map(|e| e.id());

    let (kind, newest_first) = match checkpoint.last_seen_id() {
        None => (DeltaKind::Bootstrap, &fetched[..]),
        Some(last) => match fetched.iter().position(|e| e.id() == last) {
            Some(idx) => (DeltaKind::Incremental, &fetched[..idx]),
            None => match freshest {
                None => (DeltaKind::Incremental, &fetched[..]),
                Some(f) if checkpoint.has_notified(f) => (DeltaKind::Stale, &fetched[..]),
                Some(_) => (DeltaKind::Rotated, &fetched[..]),
            },
        },
    };

    // `last_seen_id` only moves forward: never on a stale fetch, never to
    // the id it already holds.
    let new_last_seen_id = match (kind, freshest) {
        (DeltaKind::Stale, _) | (_, None) => None,
        (_, Some(f)) if Some(f) == checkpoint.last_seen_id() => None,
        (_, Some(f)) => Some(f.to_owned()),
    };

    Delta {
        kind,
        entries: newest_first.iter().rev().map(|e| (*e).clone()).collect(),
        new_last_seen_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::make_entry;

    fn feed(ids: &[&str]) -> Vec<FeedEntry> {
        ids.iter().map(|id| make_entry(id, "8-K")).collect()
    }

    fn ids(delta: &Delta) -> Vec<&str> {
        delta.entries.iter().map(|e| e.id()).collect()
    }

    fn at(last_seen: &str) -> Checkpoint {
        Checkpoint::new(Some(last_seen.to_string()), Vec::new())
    }

    #[test]
    fn new_entries_come_back_oldest_first() {
        let delta = compute_delta(&feed(&["E5", "E4", "E3", "E2", "E1"]), &at("E2"));
        assert_eq!(delta.kind, DeltaKind::Incremental);
        assert_eq!(ids(&delta), ["E3", "E4", "E5"]);
        assert_eq!(delta.new_last_seen_id.as_deref(), Some("E5"));
    }

    #[test]
    fn up_to_date_checkpoint_yields_nothing() {
        let delta = compute_delta(&feed(&["E5", "E4"]), &at("E5"));
        assert!(delta.entries.is_empty());
        assert_eq!(delta.new_last_seen_id, None);
    }

    #[test]
    fn rotated_feed_is_caught_up_in_full() {
        let delta = compute_delta(&feed(&["E9", "E8", "E7"]), &at("X"));
        assert_eq!(delta.kind, DeltaKind::Rotated);
        assert_eq!(ids(&delta), ["E7", "E8", "E9"]);
        assert_eq!(delta.new_last_seen_id.as_deref(), Some("E9"));
    }

    #[test]
    fn lagging_fetch_never_moves_last_seen_back() {
        let mut checkpoint = at("E3");
        for id in ["E1", "E2", "E3"] {
            checkpoint.mark_notified(id);
        }

        let delta = compute_delta(&feed(&["E2", "E1"]), &checkpoint);

        assert_eq!(delta.kind, DeltaKind::Stale);
        assert_eq!(delta.new_last_seen_id, None);
        assert_eq!(ids(&delta), ["E1", "E2"]);
    }

    #[test]
    fn rotation_with_a_fresh_head_is_not_stale() {
        let mut checkpoint = at("E3");
        checkpoint.mark_notified("E3");
        checkpoint.mark_notified("E2");

        let delta = compute_delta(&feed(&["E5", "E4", "E2"]), &checkpoint);

        assert_eq!(delta.kind, DeltaKind::Rotated);
        assert_eq!(delta.new_last_seen_id.as_deref(), Some("E5"));
    }

    #[test]
    fn bootstrap_returns_everything_for_recording() {
        let delta = compute_delta(&feed(&["E3", "E2", "E1"]), &Checkpoint::default());
        assert!(delta.is_bootstrap());
        assert_eq!(ids(&delta), ["E1", "E2", "E3"]);
        assert_eq!(delta.new_last_seen_id.as_deref(), Some("E3"));
    }

    #[test]
    fn empty_fetch_changes_nothing() {
        let delta = compute_delta(&[], &at("E2"));
        assert_eq!(delta.kind, DeltaKind::Incremental);
        assert!(delta.entries.is_empty());
        assert_eq!(delta.new_last_seen_id, None);

        let delta = compute_delta(&[], &Checkpoint::default());
        assert!(delta.entries.is_empty());
        assert_eq!(delta.new_last_seen_id, None);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let fetched = vec![
            make_entry("E3", "first copy"),
            make_entry("E2", "8-K"),
            make_entry("E3", "second copy"),
            make_entry("E1", "8-K"),
        ];
        let delta = compute_delta(&fetched, &at("E1"));
        assert_eq!(ids(&delta), ["E2", "E3"]);
        assert_eq!(delta.entries[1].title(), "first copy");
    }

    #[test]
    fn duplicate_of_checkpoint_id_does_not_hide_newer_entries() {
        let delta = compute_delta(&feed(&["E3", "E2", "E2", "E1"]), &at("E2"));
        assert_eq!(ids(&delta), ["E3"]);
    }
}
