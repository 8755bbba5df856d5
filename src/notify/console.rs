//! Dry-run channel: messages go to the log instead of a chat.

use async_trait::async_trait;
use tracing::info;

use super::{Notifier, SinkError};

/// Used when no chat credentials are configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), SinkError> {
        info!(target: "filing_watch::notification", "{message}");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        assert!(LogNotifier.send("New SEC filing: 8-K").await.is_ok());
        assert_eq!(LogNotifier.channel_name(), "log");
    }
}
