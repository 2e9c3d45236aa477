//! Microsoft Teams incoming-webhook notifier.

use crate::message::{build_text_message, AccountBatch};
use crate::traits::{Notifier, NotifyError};

/// Sends the plain-text summary to a Teams incoming webhook.
#[derive(Debug)]
pub struct TeamsNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl TeamsNotifier {
    pub fn new(webhook_url: String) -> Result<Self, NotifyError> {
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "Teams webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            webhook_url,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TeamsNotifier {
    async fn send(&self, batch: &AccountBatch) -> Result<(), NotifyError> {
        let payload = serde_json::json!({"text": build_text_message(batch)});
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Channel(format!(
                "Teams webhook returned {status}: {body}"
            )));
        }

        tracing::debug!(account = %batch.account_id, "Teams notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "teams"
    }
}
