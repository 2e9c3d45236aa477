//! Applies schedule decisions through the action gateway.
//!
//! Each resource's action is isolated: one failure is recorded as an error
//! outcome for that resource and never blocks siblings in the same account.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use lightsout_core::{Action, ExpectedState, ResourceKind, ScheduleDecision};
use lightsout_provider::ResourceGateway;

/// Actions that actually reach the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedAction {
    Start,
    Stop,
    Scale,
}

impl AppliedAction {
    pub fn label(&self) -> &'static str {
        match self {
            AppliedAction::Start => "start",
            AppliedAction::Stop => "stop",
            AppliedAction::Scale => "scale",
        }
    }
}

/// One applied (or failed) action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub resource_id: String,
    pub kind: ResourceKind,
    pub action: AppliedAction,
    pub expected: ExpectedState,
    pub applied_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Apply every actionable decision; no-ops pass through silently and
/// skips are logged.
pub async fn apply_decisions(
    gateway: &dyn ResourceGateway,
    decisions: &[ScheduleDecision],
) -> Vec<ActionOutcome> {
    let mut outcomes = Vec::new();

    for decision in decisions {
        let expected = match decision.expected_state() {
            Some(expected) => expected,
            None => {
                if decision.action == Action::Skip {
                    info!(
                        resource = %decision.resource_id,
                        kind = %decision.kind,
                        reason = %decision.reason,
                        "resource skipped"
                    );
                }
                continue;
            }
        };

        let (applied, result) = match &decision.action {
            Action::Start => (
                AppliedAction::Start,
                gateway.start(decision.kind, &decision.resource_id).await,
            ),
            Action::Stop => (
                AppliedAction::Stop,
                gateway.stop(decision.kind, &decision.resource_id).await,
            ),
            Action::Resize(capacity) => (
                AppliedAction::Scale,
                gateway.resize(&decision.resource_id, *capacity).await,
            ),
            Action::None | Action::Skip => continue,
        };

        let error = match result {
            Ok(()) => {
                info!(
                    resource = %decision.resource_id,
                    kind = %decision.kind,
                    action = applied.label(),
                    reason = %decision.reason,
                    "action applied"
                );
                None
            }
            Err(e) => {
                warn!(
                    resource = %decision.resource_id,
                    kind = %decision.kind,
                    action = applied.label(),
                    error = %e,
                    "action failed"
                );
                Some(e.to_string())
            }
        };

        outcomes.push(ActionOutcome {
            resource_id: decision.resource_id.clone(),
            kind: decision.kind,
            action: applied,
            expected,
            applied_at: Utc::now(),
            error,
        });
    }

    outcomes
}
