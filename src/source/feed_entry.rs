//! The core data type shared across all feed sources.
//!
//! `FeedEntry` represents a single filing from the issuer's feed.  Every
//! source implementation converts its native format into `FeedEntry`s so the
//! delta computation, classification and dispatch stay source-agnostic.
//!
//! ## For contributors
//!
//! Entries are immutable once built.  The only way to get one is
//! [`FeedEntry::new`], which refuses an empty id: an entry without a stable
//! identity cannot take part in de-duplication, so sources must drop such
//! items at their boundary (log and skip) instead of passing them on.

use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset};

/// Reasons a feed item cannot become a [`FeedEntry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("feed entry has an empty id")]
    EmptyId,
}

/// A single filing, normalised from any data source.
///
/// ## Identity
///
/// Equality and hashing look at [`id`](FeedEntry::id) only.  Two fetches of
/// the same filing compare equal even if the publisher edited its title.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    id: String,
    title: String,
    link: String,
    updated_at: DateTime<FixedOffset>,
}

impl FeedEntry {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        updated_at: DateTime<FixedOffset>,
    ) -> Result<Self, EntryError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(EntryError::EmptyId);
        }
        Ok(Self {
            id,
            title: title.into(),
            link: link.into(),
            updated_at,
        })
    }

    /// Globally unique identifier, stable across fetches (accession number,
    /// RSS guid, ...).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Descriptive text; this is what the relevance classifier looks at.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    /// Publication timestamp in the source's own offset.
    pub fn updated_at(&self) -> DateTime<FixedOffset> {
        self.updated_at
    }
}

impl PartialEq for FeedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FeedEntry {}

impl Hash for FeedEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Shorthand constructor for tests across the crate.
    pub fn make_entry(id: &str, title: &str) -> FeedEntry {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 14, 16, 5, 12)
            .unwrap();
        FeedEntry::new(id, title, format!("https://example.com/{id}"), ts).unwrap()
    }

    #[test]
    fn empty_id_is_rejected() {
        let ts = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            FeedEntry::new("", "8-K", "https://example.com", ts).unwrap_err(),
            EntryError::EmptyId
        );
        assert_eq!(
            FeedEntry::new("   ", "8-K", "https://example.com", ts).unwrap_err(),
            EntryError::EmptyId
        );
    }

    #[test]
    fn equality_is_by_id_only() {
        let a = make_entry("0000910267-25-000010", "424B3 Prospectus");
        let b = make_entry("0000910267-25-000010", "424B3 Prospectus (amended title)");
        let c = make_entry("0000910267-25-000011", "424B3 Prospectus");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_follows_id() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(make_entry("x", "first"));
        set.insert(make_entry("x", "second"));
        set.insert(make_entry("y", "third"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn accessors_expose_fields() {
        let e = make_entry("acc-1", "8-K Current report");
        assert_eq!(e.id(), "acc-1");
        assert_eq!(e.title(), "8-K Current report");
        assert_eq!(e.link(), "https://example.com/acc-1");
        assert_eq!(e.updated_at().offset().local_minus_utc(), 0);
    }
}
