//! One scheduler invocation end to end.

use futures::future::join_all;
use tracing::info;

use lightsout_core::{EngineConfig, LocalNow, ScheduleError};
use lightsout_provider::base_sts_client;
use lightsout_verify::{DynamoStore, VerificationStore};

use crate::account::{process_account, AccountReport};

/// Aggregated result of one invocation.
#[derive(Debug)]
pub struct RunSummary {
    pub accounts: Vec<AccountReport>,
}

impl RunSummary {
    pub fn total_changes(&self) -> usize {
        self.accounts.iter().map(|a| a.changes).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.accounts.iter().map(|a| a.errors.len()).sum()
    }
}

/// Execute one full reconciliation pass across all configured accounts.
///
/// The only fatal failure is an unresolvable timezone: evaluating
/// schedules against the wrong clock is worse than taking no action, so
/// nothing runs and the error propagates to the host trigger. Everything
/// below that is absorbed into per-account reports.
pub async fn run(config: &EngineConfig) -> Result<RunSummary, ScheduleError> {
    let now = LocalNow::resolve(&config.timezone)?;
    info!(
        timezone = %config.timezone,
        now = %now.stamp.format("%Y-%m-%d %H:%M:%S %Z"),
        accounts = config.accounts.len(),
        "scheduler tick"
    );

    let sts = base_sts_client().await;

    let store = match (config.verification.enabled, config.verification.table.as_ref()) {
        (true, Some(table)) => Some(DynamoStore::connect(table.clone()).await),
        _ => None,
    };
    let store_ref: Option<&dyn VerificationStore> =
        store.as_ref().map(|s| s as &dyn VerificationStore);

    let workers = config
        .accounts
        .iter()
        .map(|account| process_account(config, account, &now, &sts, store_ref));
    let accounts = join_all(workers).await;

    let summary = RunSummary { accounts };
    info!(
        changes = summary.total_changes(),
        errors = summary.total_errors(),
        "scheduler tick finished"
    );
    Ok(summary)
}
