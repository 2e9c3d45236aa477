//! Per-account run summaries and the channels that deliver them.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Teams, Slack, and Telegram notifier implementations
//! - Plain-text table rendering shared by all channels
//! - Dispatcher that builds an account's channel set and sends independently

pub mod dispatcher;
pub mod message;
pub mod slack;
pub mod teams;
pub mod telegram;
pub mod traits;

pub use dispatcher::{DispatchResult, Dispatcher};
pub use message::{
    extract_tag_summary, AccountBatch, ChangeAction, ChangeLine, VerificationGlyph,
    VerificationLine,
};
pub use traits::{Notifier, NotifyError};
