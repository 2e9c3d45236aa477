//! Verification record persistence.
//!
//! [`VerificationStore`] abstracts the key-value store; [`DynamoStore`] is
//! the production implementation. Writes to the same composite key are
//! last-writer-wins: the newest action's record is authoritative. Expired
//! records are removed by the table's time-to-live attribute.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use lightsout_core::{ExpectedState, ResourceKind};

use crate::error::VerifyError;
use crate::record::{VerificationRecord, VerificationStatus};

#[async_trait]
pub trait VerificationStore: Send + Sync {
    /// Persist a new pending record (overwrites the same composite key).
    async fn put(&self, record: &VerificationRecord) -> Result<(), VerifyError>;

    /// All records for one account still marked pending.
    async fn pending_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<VerificationRecord>, VerifyError>;

    /// Persist a status transition.
    async fn set_status(
        &self,
        record: &VerificationRecord,
        status: VerificationStatus,
    ) -> Result<(), VerifyError>;

    /// Drop a record (superseded by a newer action on the same resource).
    async fn remove(&self, record: &VerificationRecord) -> Result<(), VerifyError>;
}

/// DynamoDB-backed store.
pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    table: String,
}

impl DynamoStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Build a store on the host environment's own credential chain.
    pub async fn connect(table: String) -> Self {
        let cfg = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(aws_sdk_dynamodb::Client::new(&cfg), table)
    }
}

#[async_trait]
impl VerificationStore for DynamoStore {
    async fn put(&self, record: &VerificationRecord) -> Result<(), VerifyError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .item("pk", AttributeValue::S(record.partition_key()))
            .item("sk", AttributeValue::S(record.sort_key()))
            .item("kind", AttributeValue::S(record.kind.token().to_string()))
            .item("action", AttributeValue::S(record.action.clone()))
            .item("expected", AttributeValue::S(record.expected.encode()))
            .item(
                "created_at",
                AttributeValue::S(record.created_at.to_rfc3339()),
            )
            .item("expires_at", AttributeValue::N(record.expires_at.to_string()))
            .item("status", AttributeValue::S(record.status.as_str().to_string()))
            .send()
            .await
            .map_err(|e| VerifyError::Write(format!("{e:?}")))?;

        debug!(pk = %record.partition_key(), "verification record stored");
        Ok(())
    }

    async fn pending_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<VerificationRecord>, VerifyError> {
        let mut items = self
            .client
            .scan()
            .table_name(&self.table)
            .filter_expression("begins_with(pk, :prefix) AND #st = :pending")
            .expression_attribute_names("#st", "status")
            .expression_attribute_values(":prefix", AttributeValue::S(format!("{account_id}#")))
            .expression_attribute_values(
                ":pending",
                AttributeValue::S(VerificationStatus::Pending.as_str().to_string()),
            )
            .into_paginator()
            .items()
            .send();

        let mut records = Vec::new();
        while let Some(item) = items.next().await {
            let item = item.map_err(|e| VerifyError::Read(format!("{e:?}")))?;
            match parse_item(&item) {
                Ok(record) => records.push(record),
                Err(e) => warn!(error = %e, "skipping malformed verification record"),
            }
        }
        Ok(records)
    }

    async fn set_status(
        &self,
        record: &VerificationRecord,
        status: VerificationStatus,
    ) -> Result<(), VerifyError> {
        self.client
            .update_item()
            .table_name(&self.table)
            .key("pk", AttributeValue::S(record.partition_key()))
            .key("sk", AttributeValue::S(record.sort_key()))
            .update_expression("SET #st = :status")
            .expression_attribute_names("#st", "status")
            .expression_attribute_values(
                ":status",
                AttributeValue::S(status.as_str().to_string()),
            )
            .send()
            .await
            .map_err(|e| VerifyError::Update(format!("{e:?}")))?;
        Ok(())
    }

    async fn remove(&self, record: &VerificationRecord) -> Result<(), VerifyError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("pk", AttributeValue::S(record.partition_key()))
            .key("sk", AttributeValue::S(record.sort_key()))
            .send()
            .await
            .map_err(|e| VerifyError::Update(format!("{e:?}")))?;
        Ok(())
    }
}

fn parse_item(item: &HashMap<String, AttributeValue>) -> Result<VerificationRecord, VerifyError> {
    let key = item
        .get("pk")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default();

    let (account_id, resource_id) = string_attr(item, &key, "pk")?
        .split_once('#')
        .map(|(a, r)| (a.to_string(), r.to_string()))
        .ok_or_else(|| malformed(&key, "partition key is not account#resource"))?;

    let kind = ResourceKind::from_token(string_attr(item, &key, "kind")?)
        .ok_or_else(|| malformed(&key, "unknown resource kind"))?;
    let action = string_attr(item, &key, "action")?.to_string();
    let expected = ExpectedState::decode(string_attr(item, &key, "expected")?)
        .ok_or_else(|| malformed(&key, "unknown expected state"))?;
    let created_at = DateTime::parse_from_rfc3339(string_attr(item, &key, "created_at")?)
        .map_err(|_| malformed(&key, "bad created_at timestamp"))?
        .with_timezone(&Utc);
    let status = VerificationStatus::parse(string_attr(item, &key, "status")?)
        .ok_or_else(|| malformed(&key, "unknown status"))?;
    let expires_at: i64 = item
        .get("expires_at")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| malformed(&key, "bad expires_at"))?;

    Ok(VerificationRecord {
        account_id,
        resource_id,
        kind,
        action,
        expected,
        created_at,
        expires_at,
        status,
    })
}

fn malformed(key: &str, message: &str) -> VerifyError {
    VerifyError::Malformed {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn string_attr<'a>(
    item: &'a HashMap<String, AttributeValue>,
    key: &str,
    name: &str,
) -> Result<&'a str, VerifyError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(String::as_str)
        .ok_or_else(|| malformed(key, &format!("missing attribute {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> HashMap<String, AttributeValue> {
        HashMap::from([
            (
                "pk".to_string(),
                AttributeValue::S("111122223333#i-0abc".to_string()),
            ),
            (
                "sk".to_string(),
                AttributeValue::S("2025-06-04T10:00:00+00:00#start".to_string()),
            ),
            ("kind".to_string(), AttributeValue::S("ec2".to_string())),
            ("action".to_string(), AttributeValue::S("start".to_string())),
            (
                "expected".to_string(),
                AttributeValue::S("running".to_string()),
            ),
            (
                "created_at".to_string(),
                AttributeValue::S("2025-06-04T10:00:00+00:00".to_string()),
            ),
            (
                "expires_at".to_string(),
                AttributeValue::N("1749117600".to_string()),
            ),
            (
                "status".to_string(),
                AttributeValue::S("pending".to_string()),
            ),
        ])
    }

    #[test]
    fn parse_item_roundtrip() {
        let record = parse_item(&sample_item()).unwrap();
        assert_eq!(record.account_id, "111122223333");
        assert_eq!(record.resource_id, "i-0abc");
        assert_eq!(record.kind, ResourceKind::Ec2Instance);
        assert_eq!(record.expected, ExpectedState::Running);
        assert_eq!(record.status, VerificationStatus::Pending);
        assert_eq!(record.partition_key(), "111122223333#i-0abc");
    }

    #[test]
    fn parse_item_rejects_missing_attribute() {
        let mut item = sample_item();
        item.remove("expected");
        assert!(matches!(
            parse_item(&item),
            Err(VerifyError::Malformed { .. })
        ));
    }

    #[test]
    fn parse_item_rejects_bad_key() {
        let mut item = sample_item();
        item.insert("pk".to_string(), AttributeValue::S("no-separator".to_string()));
        assert!(matches!(
            parse_item(&item),
            Err(VerifyError::Malformed { .. })
        ));
    }
}
