//! Delayed verification of applied actions.
//!
//! Once a pending record's delay has elapsed, the resource's live state is
//! re-read and the record classified: `completed` when it matches the
//! expectation, `error` when it does not (scheduling failed or was
//! reverted, e.g. a scaling group relaunching a stopped instance). Records
//! overtaken by a newer action on the same resource are dropped without
//! ever being reported.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use lightsout_core::{ObservedState, ResourceKind};

use crate::error::VerifyError;
use crate::record::{VerificationRecord, VerificationStatus};
use crate::store::VerificationStore;

/// Re-reads one resource's live state for classification.
#[async_trait]
pub trait StateProbe: Send + Sync {
    async fn observe(&self, kind: ResourceKind, id: &str) -> Result<ObservedState, VerifyError>;
}

/// Outcome of checking one record this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Completed,
    InProgress,
    Failed,
}

/// One reportable verification line.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: String,
    pub outcome: VerificationOutcome,
}

/// Check one account's pending records against live state.
///
/// `acted_on` carries the resource ids acted on earlier in this run; their
/// pending records from previous runs are superseded and removed silently,
/// as is any record older than the newest pending record for the same
/// resource. Records younger than `delay_minutes` stay pending and are
/// reported as in progress.
pub async fn check_account(
    store: &dyn VerificationStore,
    probe: &dyn StateProbe,
    account_id: &str,
    acted_on: &HashSet<String>,
    delay_minutes: i64,
    now: DateTime<Utc>,
) -> Result<Vec<VerificationReport>, VerifyError> {
    let pending = store.pending_for_account(account_id).await?;

    // Newest pending record per resource wins; everything older is stale.
    let mut newest: HashMap<&str, DateTime<Utc>> = HashMap::new();
    for record in &pending {
        let entry = newest
            .entry(record.resource_id.as_str())
            .or_insert(record.created_at);
        if record.created_at > *entry {
            *entry = record.created_at;
        }
    }

    let mut reports = Vec::new();
    for record in &pending {
        let superseded = acted_on.contains(&record.resource_id)
            || newest
                .get(record.resource_id.as_str())
                .is_some_and(|ts| *ts > record.created_at);
        if superseded {
            debug!(resource = %record.resource_id, "dropping superseded verification record");
            store.remove(record).await?;
            continue;
        }

        if record.age_minutes(now) < delay_minutes {
            reports.push(report(record, VerificationOutcome::InProgress));
            continue;
        }

        let observed = match probe.observe(record.kind, &record.resource_id).await {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    resource = %record.resource_id,
                    error = %e,
                    "verification probe failed; record stays pending"
                );
                continue;
            }
        };

        let (status, outcome) = if record.expected.matches(&observed) {
            (VerificationStatus::Completed, VerificationOutcome::Completed)
        } else {
            (VerificationStatus::Error, VerificationOutcome::Failed)
        };
        store.set_status(record, status).await?;
        reports.push(report(record, outcome));
    }

    Ok(reports)
}

fn report(record: &VerificationRecord, outcome: VerificationOutcome) -> VerificationReport {
    VerificationReport {
        resource_id: record.resource_id.clone(),
        kind: record.kind,
        action: record.action.clone(),
        outcome,
    }
}
