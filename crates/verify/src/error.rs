//! Verification error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("store write failed: {0}")]
    Write(String),

    #[error("store read failed: {0}")]
    Read(String),

    #[error("store update failed: {0}")]
    Update(String),

    #[error("malformed record {key}: {message}")]
    Malformed { key: String, message: String },

    #[error("state probe failed: {0}")]
    Probe(String),
}
