//! Telegram Bot API notifier.
//!
//! Delivers messages via the `sendMessage` endpoint as plain text (filing
//! titles are full of characters MarkdownV2 would need escaped).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Notifier, SinkError};

const API_BASE: &str = "https://api.telegram.org";

/// Sends notifications to one chat via the Telegram Bot API.
#[derive(Debug)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Returns [`SinkError::Config`] if the token or chat id is empty.
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self, SinkError> {
        if bot_token.trim().is_empty() {
            return Err(SinkError::Config(
                "Telegram bot token must not be empty".to_string(),
            ));
        }
        if chat_id.trim().is_empty() {
            return Err(SinkError::Config(
                "Telegram chat id must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            bot_token,
            chat_id,
            client,
        })
    }
}

/// Map a Bot API reply onto success or a [`SinkError`].
fn interpret_response(status: reqwest::StatusCode, body: &Value) -> Result<(), SinkError> {
    if body.get("ok") == Some(&Value::Bool(true)) {
        return Ok(());
    }

    // Handle rate limiting (HTTP 429).
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = body
            .get("parameters")
            .and_then(|p| p.get("retry_after"))
            .and_then(|v| v.as_u64())
            .unwrap_or(30);
        return Err(SinkError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    let description = body
        .get("description")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown Telegram API error");
    Err(SinkError::Api(format!("{status}: {description}")))
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<(), SinkError> {
        let url = format!("{API_BASE}/bot{}/sendMessage", self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
            "disable_web_page_preview": true,
        });

        tracing::debug!(chat_id = %self.chat_id, "sending Telegram notification");

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let reply: Value = response.json().await?;
        interpret_response(status, &reply)
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
