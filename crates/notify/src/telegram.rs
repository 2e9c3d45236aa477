//! Telegram Bot API notifier with HTML formatting.
//!
//! Delivers summaries via the Telegram Bot API `sendMessage` endpoint,
//! with rate limit handling.

use crate::message::{build_telegram_html, AccountBatch};
use crate::traits::{Notifier, NotifyError};

/// Sends notifications via the Telegram Bot API.
#[derive(Debug)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Both the bot token and the destination chat id are required; a
    /// half-configured channel is rejected as a whole.
    pub fn new(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        if bot_token.trim().is_empty() || chat_id.trim().is_empty() {
            return Err(NotifyError::Config(
                "Telegram bot token and chat id must both be set".to_string(),
            ));
        }
        Ok(Self {
            bot_token,
            chat_id,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, batch: &AccountBatch) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let body = serde_json::json!({
            "chat_id": self.chat_id,
            "text": build_telegram_html(batch),
            "parse_mode": "HTML",
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let resp_body: serde_json::Value = response.json().await?;

        if resp_body.get("ok") == Some(&serde_json::Value::Bool(true)) {
            tracing::debug!(account = %batch.account_id, "Telegram notification delivered");
            return Ok(());
        }

        // Handle rate limiting (HTTP 429).
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp_body
                .get("parameters")
                .and_then(|p| p.get("retry_after"))
                .and_then(|v| v.as_u64())
                .unwrap_or(30);
            return Err(NotifyError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        let description = resp_body
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown Telegram API error");
        Err(NotifyError::Channel(format!(
            "Telegram API error: {description}"
        )))
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
