//! RSS filings source.
//!
//! Reads an RSS 2.0 filings feed over HTTP using the [`rss`] crate.  Items
//! are kept in document order, which by feed convention is newest first.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use tracing::warn;

use super::{DataSource, FeedEntry, FetchError};

/// Filings read from an RSS 2.0 document.
pub struct RssSource {
    /// The feed URL to poll.
    url: String,
    /// A human-readable label used in logs.
    label: String,
    client: reqwest::Client,
}

impl RssSource {
    /// # Arguments
    ///
    /// * `url`: full URL of the RSS feed.
    /// * `label`: short name used in log lines for this feed.
    /// * `user_agent`: sent with every request; SEC endpoints reject
    ///   anonymous clients.
    /// * `timeout`: overall per-request timeout.
    pub fn new(
        url: impl Into<String>,
        label: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.into(),
            label: label.into(),
            client,
        })
    }

    /// Parse an already-fetched [`rss::Channel`] into [`FeedEntry`]s.
    ///
    /// No I/O here; tests drive it with inline XML.  Items without an id
    /// or with an unparseable date are skipped with a warning.
    pub fn parse_channel(channel: &rss::Channel, label: &str) -> Vec<FeedEntry> {
        channel
            .items()
            .iter()
            .filter_map(|item| {
                // Prefer <guid>, fall back to <link>.
                let id = item
                    .guid()
                    .map(|g| g.value().to_string())
                    .or_else(|| item.link().map(String::from))
                    .unwrap_or_default();

                let Some(updated_at) = item
                    .pub_date()
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                else {
                    warn!(source = label, entry_id = %id, "skipping item without a valid pubDate");
                    return None;
                };

                let title = item.title().unwrap_or("(untitled)");
                let link = item.link().unwrap_or_default();

                match FeedEntry::new(id, title, link, updated_at) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(source = label, title, error = %e, "skipping item");
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl DataSource for RssSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }
        let body = response.bytes().await?;
        let channel =
            rss::Channel::read_from(body.as_ref()).map_err(|e| FetchError::Parse(e.to_string()))?;
        Ok(Self::parse_channel(&channel, &self.label))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
