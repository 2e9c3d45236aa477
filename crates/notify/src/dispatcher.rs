//! Routes account summaries to configured channels.
//!
//! The channel set is built per account from its configuration: a channel
//! with no endpoint is silently skipped, and a half-configured Telegram
//! channel (token without chat id, or the reverse) is skipped as a whole.
//! Individual channel failures don't block other channels.

use lightsout_core::AccountConfig;

use crate::message::AccountBatch;
use crate::slack::SlackNotifier;
use crate::teams::TeamsNotifier;
use crate::telegram::TelegramNotifier;
use crate::traits::Notifier;

/// Result of dispatching to a single channel.
#[derive(Debug)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Dispatches one account's summary to its configured channels.
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    /// Build the channel set for one account.
    pub fn for_account(account: &AccountConfig) -> Self {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(url) = nonempty(&account.teams_webhook) {
            match TeamsNotifier::new(url.to_string()) {
                Ok(notifier) => channels.push(Box::new(notifier)),
                Err(e) => {
                    tracing::warn!(account = %account.account_id, error = %e, "skipping teams channel")
                }
            }
        }

        if let Some(url) = nonempty(&account.slack_webhook) {
            match SlackNotifier::new(url.to_string()) {
                Ok(notifier) => channels.push(Box::new(notifier)),
                Err(e) => {
                    tracing::warn!(account = %account.account_id, error = %e, "skipping slack channel")
                }
            }
        }

        match (
            nonempty(&account.telegram_bot_token),
            nonempty(&account.telegram_chat_id),
        ) {
            (Some(token), Some(chat_id)) => {
                match TelegramNotifier::new(token.to_string(), chat_id.to_string()) {
                    Ok(notifier) => channels.push(Box::new(notifier)),
                    Err(e) => {
                        tracing::warn!(account = %account.account_id, error = %e, "skipping telegram channel")
                    }
                }
            }
            (Some(_), None) | (None, Some(_)) => {
                tracing::warn!(
                    account = %account.account_id,
                    "telegram channel half-configured; skipping"
                );
            }
            (None, None) => {}
        }

        Self { channels }
    }

    #[cfg(test)]
    fn with_channels(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Dispatch a batch to every channel. A batch with neither change
    /// lines nor verification lines is suppressed entirely.
    pub async fn dispatch(&self, batch: &AccountBatch) -> Vec<DispatchResult> {
        if batch.is_empty() {
            tracing::debug!(account = %batch.account_id, "nothing to notify");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let (success, error) = match channel.send(batch).await {
                Ok(()) => {
                    tracing::info!(
                        account = %batch.account_id,
                        channel = channel.channel_name(),
                        "notification delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        account = %batch.account_id,
                        channel = channel.channel_name(),
                        error = %e,
                        "notification delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };
            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
            });
        }
        results
    }
}

fn nonempty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChangeAction, ChangeLine};
    use crate::traits::NotifyError;
    use lightsout_core::ResourceKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _batch: &AccountBatch) -> Result<(), NotifyError> {
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Channel("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn batch(changes: Vec<ChangeLine>) -> AccountBatch {
        AccountBatch {
            title: "staging".to_string(),
            account_id: "111122223333".to_string(),
            region: "ap-northeast-2".to_string(),
            time_text: "2025-06-04 10:00 KST".to_string(),
            changes,
            verifications: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn one_change() -> Vec<ChangeLine> {
        vec![ChangeLine {
            action: ChangeAction::Start,
            kind: ResourceKind::Ec2Instance,
            resource_id: "i-0abc".to_string(),
            details: None,
            tag_summary: String::new(),
        }]
    }

    fn account(teams: Option<&str>, tg_token: Option<&str>, tg_chat: Option<&str>) -> AccountConfig {
        AccountConfig {
            account_id: "111122223333".to_string(),
            region: "ap-northeast-2".to_string(),
            iam_role: "scheduler".to_string(),
            description: None,
            teams_webhook: teams.map(String::from),
            slack_webhook: None,
            telegram_bot_token: tg_token.map(String::from),
            telegram_chat_id: tg_chat.map(String::from),
        }
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::with_channels(vec![
            Box::new(MockNotifier {
                name: "a".to_string(),
                send_count: count_a.clone(),
                should_fail: false,
            }),
            Box::new(MockNotifier {
                name: "b".to_string(),
                send_count: count_b.clone(),
                should_fail: false,
            }),
        ]);

        let results = dispatcher.dispatch(&batch(one_change())).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::with_channels(vec![
            Box::new(MockNotifier {
                name: "fail".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
            }),
            Box::new(MockNotifier {
                name: "ok".to_string(),
                send_count: count.clone(),
                should_fail: false,
            }),
        ]);

        let results = dispatcher.dispatch(&batch(one_change())).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1); // second channel still sent
    }

    #[tokio::test]
    async fn empty_batch_is_suppressed() {
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::with_channels(vec![Box::new(MockNotifier {
            name: "a".to_string(),
            send_count: count.clone(),
            should_fail: false,
        })]);

        let results = dispatcher.dispatch(&batch(Vec::new())).await;
        assert!(results.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unconfigured_channels_are_skipped() {
        let dispatcher = Dispatcher::for_account(&account(None, None, None));
        assert_eq!(dispatcher.channel_count(), 0);

        let dispatcher = Dispatcher::for_account(&account(Some("https://example.com/hook"), None, None));
        assert_eq!(dispatcher.channel_count(), 1);

        let dispatcher = Dispatcher::for_account(&account(Some("  "), None, None));
        assert_eq!(dispatcher.channel_count(), 0);
    }

    #[test]
    fn half_configured_telegram_is_skipped_as_a_whole() {
        let dispatcher = Dispatcher::for_account(&account(None, Some("123:ABC"), None));
        assert_eq!(dispatcher.channel_count(), 0);

        let dispatcher = Dispatcher::for_account(&account(None, None, Some("-100123")));
        assert_eq!(dispatcher.channel_count(), 0);

        let dispatcher = Dispatcher::for_account(&account(None, Some("123:ABC"), Some("-100123")));
        assert_eq!(dispatcher.channel_count(), 1);
    }
}
