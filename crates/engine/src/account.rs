//! Per-account processing: one scoped credential session, enumerate,
//! decide, execute, verify, notify.
//!
//! The report is an explicit accumulator built and returned to the runner;
//! no state is shared across accounts. Every failure below account level
//! is absorbed into the report instead of propagating.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use lightsout_core::{
    decide, Action, AccountConfig, EngineConfig, LocalNow, ObservedState, ResourceKind,
    ResourceRecord, ScheduleDecision,
};
use lightsout_provider::{
    AccountGateway, AccountSession, AsgFleet, Ec2Fleet, RdsFleet, ResourceGateway, StsClient,
};
use lightsout_verify::{
    check_account, StateProbe, VerificationOutcome, VerificationRecord, VerificationReport,
    VerificationStore, VerifyError,
};
use lightsout_notify::{
    extract_tag_summary, AccountBatch, ChangeAction, ChangeLine, Dispatcher, VerificationGlyph,
    VerificationLine,
};

use crate::executor::{apply_decisions, ActionOutcome, AppliedAction};

/// Everything one account contributed to this run.
#[derive(Debug, Default)]
pub struct AccountReport {
    pub account_id: String,
    pub scanned: usize,
    pub changes: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

pub async fn process_account(
    config: &EngineConfig,
    account: &AccountConfig,
    now: &LocalNow,
    sts: &StsClient,
    store: Option<&dyn VerificationStore>,
) -> AccountReport {
    let mut report = AccountReport {
        account_id: account.account_id.clone(),
        ..Default::default()
    };

    let session = match AccountSession::assume(sts, account).await {
        Ok(session) => session,
        Err(e) => {
            warn!(account = %account.account_id, error = %e, "credential assumption failed; skipping account");
            report.errors.push(e.to_string());
            return report;
        }
    };

    let (records, enumeration_errors) = enumerate(config, &session).await;
    report.scanned = records.len();
    report.errors.extend(enumeration_errors);

    let decisions: Vec<ScheduleDecision> = records
        .iter()
        .map(|record| decide(record, &config.tags, now))
        .collect();
    report.skipped = decisions
        .iter()
        .filter(|d| d.action == Action::Skip)
        .count();

    let gateway = AccountGateway::new(&session);
    let outcomes = apply_decisions(&gateway, &decisions).await;

    let by_id: HashMap<&str, &ResourceRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();
    let mut changes = Vec::new();
    for outcome in &outcomes {
        if let Some(error) = &outcome.error {
            report
                .errors
                .push(format!("{}: {}", outcome.resource_id, error));
            continue;
        }
        let tag_summary = by_id
            .get(outcome.resource_id.as_str())
            .map(|record| extract_tag_summary(&record.tags, &config.notification_tag_keys))
            .unwrap_or_default();
        changes.push(change_line(outcome, tag_summary));
    }
    report.changes = changes.len();

    // Classify previous runs' pending records first, then persist this
    // run's actions as new pending records.
    let mut verifications = Vec::new();
    if let Some(store) = store {
        let acted_on: HashSet<String> = outcomes
            .iter()
            .filter(|o| o.succeeded())
            .map(|o| o.resource_id.clone())
            .collect();
        let probe = GatewayProbe { gateway: &gateway };
        match check_account(
            store,
            &probe,
            &account.account_id,
            &acted_on,
            config.verification.delay_minutes,
            Utc::now(),
        )
        .await
        {
            Ok(reports) => verifications.extend(reports.into_iter().map(verification_line)),
            Err(e) => {
                warn!(account = %account.account_id, error = %e, "verification check failed");
                report.errors.push(format!("verification: {e}"));
            }
        }

        for outcome in outcomes.iter().filter(|o| o.succeeded()) {
            let record = VerificationRecord::new(
                account.account_id.clone(),
                outcome.resource_id.clone(),
                outcome.kind,
                outcome.action.label(),
                outcome.expected.clone(),
                outcome.applied_at,
                config.verification.retention_hours,
            );
            if let Err(e) = store.put(&record).await {
                warn!(resource = %outcome.resource_id, error = %e, "failed to store verification record");
                report.errors.push(format!("verification store: {e}"));
            }
        }
    }

    info!(
        account = %account.account_id,
        region = %account.region,
        scanned = report.scanned,
        changes = report.changes,
        skipped = report.skipped,
        errors = report.errors.len(),
        "account processed"
    );

    let batch = AccountBatch {
        title: account.label().to_string(),
        account_id: account.account_id.clone(),
        region: account.region.clone(),
        time_text: now.stamp.format("%Y-%m-%d %H:%M %Z").to_string(),
        changes,
        verifications,
        errors: report.errors.clone(),
    };
    Dispatcher::for_account(account).dispatch(&batch).await;

    report
}

/// Enumerate all enabled resource kinds concurrently. A failing kind is
/// surfaced as an error line; the others still contribute records.
async fn enumerate(
    config: &EngineConfig,
    session: &AccountSession,
) -> (Vec<ResourceRecord>, Vec<String>) {
    let ec2 = async {
        if !config.enable_ec2 {
            return Ok(Vec::new());
        }
        Ec2Fleet::new(session).list(&config.tags).await
    };
    let rds_instances = async {
        if !config.enable_rds {
            return Ok(Vec::new());
        }
        RdsFleet::new(session).list_instances().await
    };
    let rds_clusters = async {
        if !config.enable_rds {
            return Ok(Vec::new());
        }
        RdsFleet::new(session).list_clusters().await
    };
    let asg = async {
        if !config.enable_asg {
            return Ok(Vec::new());
        }
        AsgFleet::new(session).list().await
    };

    let (ec2, rds_instances, rds_clusters, asg) =
        tokio::join!(ec2, rds_instances, rds_clusters, asg);

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for result in [ec2, rds_instances, rds_clusters, asg] {
        match result {
            Ok(batch) => records.extend(batch),
            Err(e) => errors.push(e.to_string()),
        }
    }
    (records, errors)
}

/// Adapts the account gateway to the verifier's probe seam.
struct GatewayProbe<'a> {
    gateway: &'a AccountGateway,
}

#[async_trait]
impl StateProbe for GatewayProbe<'_> {
    async fn observe(&self, kind: ResourceKind, id: &str) -> Result<ObservedState, VerifyError> {
        self.gateway
            .observe(kind, id)
            .await
            .map_err(|e| VerifyError::Probe(e.to_string()))
    }
}

fn change_line(outcome: &ActionOutcome, tag_summary: String) -> ChangeLine {
    use lightsout_core::ExpectedState;

    let (action, details) = match (&outcome.action, &outcome.expected) {
        (AppliedAction::Scale, ExpectedState::Capacity(capacity)) => {
            (ChangeAction::Scale, Some(capacity.describe()))
        }
        (AppliedAction::Scale, _) => (ChangeAction::Scale, None),
        (AppliedAction::Start, _) => (ChangeAction::Start, None),
        (AppliedAction::Stop, _) => (ChangeAction::Stop, None),
    };
    ChangeLine {
        action,
        kind: outcome.kind,
        resource_id: outcome.resource_id.clone(),
        details,
        tag_summary,
    }
}

fn verification_line(report: VerificationReport) -> VerificationLine {
    let status = match report.outcome {
        VerificationOutcome::Completed => VerificationGlyph::Completed,
        VerificationOutcome::InProgress => VerificationGlyph::InProgress,
        VerificationOutcome::Failed => VerificationGlyph::Error,
    };
    VerificationLine {
        status,
        kind: report.kind,
        resource_id: report.resource_id,
        action: report.action,
    }
}
