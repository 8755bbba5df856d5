//! Notification formatting and delivery.
//!
//! This module provides:
//! - [`Notifier`] trait for pluggable outbound channels
//! - [`TelegramNotifier`] and [`LogNotifier`] implementations
//! - [`Dispatcher`], which renders an entry into a message and hands it to
//!   the configured channel under a timeout

mod console;
mod telegram;

pub use console::LogNotifier;
pub use telegram::TelegramNotifier;

use std::time::Duration;

use async_trait::async_trait;
use chrono::FixedOffset;
use tracing::{info, warn};

use crate::source::FeedEntry;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected the message: {0}")]
    Api(String),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Trait for notification channel implementations.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message.  A single best-effort attempt; retrying is the
    /// poll loop's business.
    async fn send(&self, message: &str) -> Result<(), SinkError>;

    /// Human-readable name for this channel (e.g. "telegram").
    fn channel_name(&self) -> &str;
}

/// Renders entries into messages and delivers them through one channel.
pub struct Dispatcher {
    notifier: Box<dyn Notifier>,
    display_offset: FixedOffset,
    display_label: String,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        notifier: Box<dyn Notifier>,
        display_offset: FixedOffset,
        display_label: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            notifier,
            display_offset,
            display_label: display_label.into(),
            timeout,
        }
    }

    /// Deterministic message text for `entry`.
    pub fn format(&self, entry: &FeedEntry) -> String {
        let published = entry.updated_at();
        let local = published.with_timezone(&self.display_offset);
        format!(
            "New SEC filing: {title}\n{link}\nPublished: {src} ({local} {label})\nID: {id}",
            title = entry.title(),
            link = entry.link(),
            src = published.format("%Y-%m-%d %H:%M:%S %:z"),
            local = local.format("%Y-%m-%d %H:%M:%S"),
            label = self.display_label,
            id = entry.id(),
        )
    }

    /// Send `message`, bounded by the dispatch timeout.  Failures are logged
    /// here and returned so the caller can leave the entry unmarked.
    pub async fn dispatch(&self, message: &str) -> Result<(), SinkError> {
        let channel = self.notifier.channel_name();
        let result = match tokio::time::timeout(self.timeout, self.notifier.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::Timeout(self.timeout)),
        };

        match &result {
            Ok(()) => info!(channel, "notification delivered"),
            Err(e) => warn!(channel, error = %e, "notification failed"),
        }
        result
    }
}

/// Parse a fixed UTC offset such as `+01:00`, `-0530`, `+2` or `UTC`.
pub fn parse_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => (rest.get(..2)?, rest.get(2..)?),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
