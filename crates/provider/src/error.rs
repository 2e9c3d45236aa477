//! Provider error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("assume role failed for account {account}: {message}")]
    AssumeRole { account: String, message: String },

    #[error("{kind} enumeration failed: {message}")]
    List { kind: &'static str, message: String },

    #[error("action failed for {resource}: {message}")]
    Action { resource: String, message: String },

    #[error("state probe failed for {resource}: {message}")]
    Probe { resource: String, message: String },
}
