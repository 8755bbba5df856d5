//! Data source abstraction layer.
//!
//! This module defines the [`DataSource`] trait and the common [`FeedEntry`]
//! type.  Concrete source implementations live in sub-modules:
//! [`edgar`] reads the EDGAR submissions JSON for one issuer and [`rss`]
//! reads an RSS 2.0 filings feed.
//!
//! ## Adding a new source
//!
//! 1. Create a new file in this directory (e.g. `atom.rs`).
//! 2. Define a struct (e.g. `AtomSource`) and implement [`DataSource`] for it.
//! 3. Add `mod atom;` below and re-export your struct in the `pub use` block.
//! 4. Add a [`SourceKind`](crate::config::SourceKind) variant and construct
//!    the source in `main.rs`.
//!
//! The poll loop, delta computation and dispatch are all source-agnostic.

mod edgar;
mod feed_entry;
mod rss;

// Re-export the public API of this module so callers can write
// `use crate::source::{DataSource, FeedEntry, EdgarSource};`
pub use edgar::EdgarSource;
pub use feed_entry::{EntryError, FeedEntry};
pub use rss::RssSource;

#[cfg(test)]
pub(crate) use feed_entry::tests::make_entry;

use std::time::Duration;

use async_trait::async_trait;

/// Everything that can go wrong while retrieving the feed.
///
/// Any of these skips the current tick; the poll loop retries on the next
/// interval.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("could not parse feed: {0}")]
    Parse(String),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait that every data source must implement.
///
/// The poll loop calls [`fetch()`](DataSource::fetch) once per tick, so
/// implementations must be [`Send`] + [`Sync`].
///
/// ## Contract
///
/// * Entries come back **newest first**.
/// * Ids are stable across repeated fetches of the same filing.
/// * Items without a usable id never make it into the result.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Human-readable label used in log lines.
    fn name(&self) -> &str;

    /// Fetch the latest batch of entries.
    async fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError>;
}
