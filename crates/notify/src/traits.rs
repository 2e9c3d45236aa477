//! Notifier trait definition and shared error types.

use crate::message::AccountBatch;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one account's run summary through this channel.
    async fn send(&self, batch: &AccountBatch) -> Result<(), NotifyError>;

    /// Human-readable name for this channel (e.g., "slack", "telegram").
    fn channel_name(&self) -> &str;
}
