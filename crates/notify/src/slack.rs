//! Slack incoming-webhook notifier with Block Kit formatting.

use crate::message::{build_slack_payload, AccountBatch};
use crate::traits::{Notifier, NotifyError};

/// Sends the Block Kit summary to a Slack incoming webhook.
#[derive(Debug)]
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Result<Self, NotifyError> {
        if webhook_url.trim().is_empty() {
            return Err(NotifyError::Config(
                "Slack webhook URL must not be empty".to_string(),
            ));
        }
        Ok(Self {
            webhook_url,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, batch: &AccountBatch) -> Result<(), NotifyError> {
        let payload = build_slack_payload(batch);
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
                "Slack webhook returned {status}: {body}"
            )));
        }

        tracing::debug!(account = %batch.account_id, "Slack notification delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "slack"
    }
}
