//! Persisted verification records.

use chrono::{DateTime, Duration, Utc};

use lightsout_core::{ExpectedState, ResourceKind};

/// Lifecycle status of a verification record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Pending,
    Completed,
    Error,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Completed => "completed",
            VerificationStatus::Error => "error",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(VerificationStatus::Pending),
            "completed" => Some(VerificationStatus::Completed),
            "error" => Some(VerificationStatus::Error),
            _ => None,
        }
    }
}

/// One recorded action awaiting (or past) delayed verification.
#[derive(Debug, Clone)]
pub struct VerificationRecord {
    pub account_id: String,
    pub resource_id: String,
    pub kind: ResourceKind,
    /// Action token (`start`, `stop`, `scale`).
    pub action: String,
    pub expected: ExpectedState,
    pub created_at: DateTime<Utc>,
    /// Epoch seconds past which the store expires the record on its own.
    pub expires_at: i64,
    pub status: VerificationStatus,
}

impl VerificationRecord {
    pub fn new(
        account_id: String,
        resource_id: String,
        kind: ResourceKind,
        action: &str,
        expected: ExpectedState,
        created_at: DateTime<Utc>,
        retention_hours: i64,
    ) -> Self {
        let expires_at = (created_at + Duration::hours(retention_hours)).timestamp();
        Self {
            account_id,
            resource_id,
            kind,
            action: action.to_string(),
            expected,
            created_at,
            expires_at,
            status: VerificationStatus::Pending,
        }
    }

    /// Partition key: account + resource composite.
    pub fn partition_key(&self) -> String {
        format!("{}#{}", self.account_id, self.resource_id)
    }

    /// Sort key: action timestamp + action composite, so repeated actions
    /// on the same resource never collide.
    pub fn sort_key(&self) -> String {
        format!("{}#{}", self.created_at.to_rfc3339(), self.action)
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_minutes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_and_ttl() {
        let created = "2025-06-04T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let record = VerificationRecord::new(
            "111122223333".to_string(),
            "i-0abc".to_string(),
            ResourceKind::Ec2Instance,
            "start",
            ExpectedState::Running,
            created,
            24,
        );
        assert_eq!(record.partition_key(), "111122223333#i-0abc");
        assert!(record.sort_key().starts_with("2025-06-04T10:00:00"));
        assert!(record.sort_key().ends_with("#start"));
        assert_eq!(record.expires_at - created.timestamp(), 24 * 3600);
        assert_eq!(record.status, VerificationStatus::Pending);
    }

    #[test]
    fn age_in_minutes() {
        let created = "2025-06-04T10:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let now = "2025-06-04T10:35:00Z".parse::<DateTime<Utc>>().unwrap();
        let record = VerificationRecord::new(
            "a".to_string(),
            "r".to_string(),
            ResourceKind::Ec2Instance,
            "stop",
            ExpectedState::Stopped,
            created,
            1,
        );
        assert_eq!(record.age_minutes(now), 35);
    }

    #[test]
    fn status_roundtrip() {
        for status in [
            VerificationStatus::Pending,
            VerificationStatus::Completed,
            VerificationStatus::Error,
        ] {
            assert_eq!(VerificationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VerificationStatus::parse("done"), None);
    }
}
