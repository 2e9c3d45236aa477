//! Core error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ACCOUNTS_JSON is not valid JSON: {0}")]
    AccountsJson(String),

    #[error("account entry missing required field: {0}")]
    AccountField(&'static str),

    #[error("verification is enabled but VERIFY_TABLE is not set")]
    MissingVerifyTable,
}

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("invalid time value: {0}")]
    BadTime(String),

    #[error("invalid weekday token: {0}")]
    BadWeekday(String),

    #[error("invalid capacity tags: {0}")]
    BadCapacity(String),
}
