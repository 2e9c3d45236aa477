//! Environment-driven configuration.
//!
//! Everything is read once at startup into an immutable [`EngineConfig`]
//! that is passed by reference into every component; nothing reads ambient
//! environment state after that.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y"),
        Err(_) => default,
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    env_opt(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// A blank tag-key override falls back to the default key.
fn tag_key_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                default.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => default.to_string(),
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// IANA zone every schedule is evaluated against.
    pub timezone: String,
    pub enable_ec2: bool,
    pub enable_rds: bool,
    pub enable_asg: bool,
    pub tags: TagKeys,
    /// Extra tag keys surfaced in notification lines.
    pub notification_tag_keys: Vec<String>,
    pub verification: VerificationConfig,
    pub accounts: Vec<AccountConfig>,
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Result<Self, ConfigError> {
        let accounts = parse_accounts(&env_or("ACCOUNTS_JSON", "[]"))?;
        let verification = VerificationConfig::from_env()?;

        Ok(Self {
            timezone: {
                let tz = env_or("TIMEZONE", "Asia/Seoul");
                let tz = tz.trim();
                if tz.is_empty() {
                    "Asia/Seoul".to_string()
                } else {
                    tz.to_string()
                }
            },
            enable_ec2: env_bool("ENABLE_EC2", true),
            enable_rds: env_bool("ENABLE_RDS", false),
            enable_asg: env_bool("ENABLE_ASG", false),
            tags: TagKeys::from_env(),
            notification_tag_keys: parse_notification_tag_keys(&env_or(
                "NOTIFICATION_TAG_KEYS",
                "",
            )),
            verification,
            accounts,
        })
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  schedule:     timezone={}, ec2={}, rds={}, asg={}",
            self.timezone,
            self.enable_ec2,
            self.enable_rds,
            self.enable_asg
        );
        tracing::info!(
            "  tags:         schedule={}={}, start={}, stop={}, weekdays={}",
            self.tags.schedule,
            self.tags.schedule_value,
            self.tags.start,
            self.tags.stop,
            self.tags.weekdays
        );
        tracing::info!(
            "  verification: enabled={}, table={}, delay={}m, retention={}h",
            self.verification.enabled,
            self.verification.table.as_deref().unwrap_or("(none)"),
            self.verification.delay_minutes,
            self.verification.retention_hours
        );
        tracing::info!("  accounts:     {}", self.accounts.len());
        for account in &self.accounts {
            tracing::info!(
                "    {} region={} teams={} slack={} telegram={}",
                account.account_id,
                account.region,
                account.teams_webhook.is_some(),
                account.slack_webhook.is_some(),
                account.telegram_bot_token.is_some() && account.telegram_chat_id.is_some()
            );
        }
    }
}

// ── Schedule tag keys ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TagKeys {
    /// Enable-tag key; resources without it never participate.
    pub schedule: String,
    /// Expected enable-tag value (case-insensitive; empty matches any).
    pub schedule_value: String,
    pub start: String,
    pub stop: String,
    pub weekdays: String,
    pub asg_min: String,
    pub asg_max: String,
    pub asg_desired: String,
}

impl TagKeys {
    fn from_env() -> Self {
        Self {
            schedule: tag_key_or("TAG_SCHEDULE_KEY", "Schedule"),
            schedule_value: env::var("TAG_SCHEDULE_VALUE")
                .map(|v| v.trim().to_string())
                .unwrap_or_else(|_| "True".to_string()),
            start: tag_key_or("TAG_START_KEY", "Schedule_Start"),
            stop: tag_key_or("TAG_STOP_KEY", "Schedule_Stop"),
            weekdays: tag_key_or("TAG_WEEKDAY_KEY", "Schedule_Weekend"),
            asg_min: tag_key_or("TAG_ASG_MIN_KEY", "Schedule_Asg_Min"),
            asg_max: tag_key_or("TAG_ASG_MAX_KEY", "Schedule_Asg_Max"),
            asg_desired: tag_key_or("TAG_ASG_DESIRED_KEY", "Schedule_Asg_Desired"),
        }
    }
}

impl Default for TagKeys {
    fn default() -> Self {
        Self {
            schedule: "Schedule".to_string(),
            schedule_value: "True".to_string(),
            start: "Schedule_Start".to_string(),
            stop: "Schedule_Stop".to_string(),
            weekdays: "Schedule_Weekend".to_string(),
            asg_min: "Schedule_Asg_Min".to_string(),
            asg_max: "Schedule_Asg_Max".to_string(),
            asg_desired: "Schedule_Asg_Desired".to_string(),
        }
    }
}

// ── Verification ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct VerificationConfig {
    pub enabled: bool,
    pub table: Option<String>,
    /// Minimum age before a pending record is classified.
    pub delay_minutes: i64,
    /// TTL horizon for stored records.
    pub retention_hours: i64,
}

impl VerificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let enabled = env_bool("VERIFY_ENABLED", false);
        let table = env_opt("VERIFY_TABLE");
        if enabled && table.is_none() {
            return Err(ConfigError::MissingVerifyTable);
        }
        Ok(Self {
            enabled,
            table,
            delay_minutes: env_i64("VERIFY_DELAY_MINUTES", 30),
            retention_hours: env_i64("VERIFY_RETENTION_HOURS", 24),
        })
    }
}

// ── Accounts ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub account_id: String,
    pub region: String,
    pub iam_role: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub teams_webhook: Option<String>,
    #[serde(default)]
    pub slack_webhook: Option<String>,
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
}

impl AccountConfig {
    /// A bare role name expands to the canonical reference in this account.
    pub fn role_arn(&self) -> String {
        if self.iam_role.starts_with("arn:") {
            self.iam_role.clone()
        } else {
            format!("arn:aws:iam::{}:role/{}", self.account_id, self.iam_role)
        }
    }

    /// Display label: the description when present, else the account id.
    pub fn label(&self) -> &str {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(&self.account_id)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.account_id.trim().is_empty() {
            return Err(ConfigError::AccountField("account_id"));
        }
        if self.region.trim().is_empty() {
            return Err(ConfigError::AccountField("region"));
        }
        if self.iam_role.trim().is_empty() {
            return Err(ConfigError::AccountField("iam_role"));
        }
        Ok(())
    }
}

fn parse_accounts(raw: &str) -> Result<Vec<AccountConfig>, ConfigError> {
    let accounts: Vec<AccountConfig> =
        serde_json::from_str(raw).map_err(|e| ConfigError::AccountsJson(e.to_string()))?;
    for account in &accounts {
        account.validate()?;
    }
    Ok(accounts)
}

/// Accepts either a JSON array of strings or a comma-separated list.
fn parse_notification_tag_keys(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    if let Ok(keys) = serde_json::from_str::<Vec<String>>(raw) {
        return keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
    }
    raw.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
