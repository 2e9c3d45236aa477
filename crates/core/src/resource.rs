//! Domain types shared across the scheduler: resource identity, observed
//! state, and the state an action is expected to reach.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The resource families the scheduler knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Ec2Instance,
    DbInstance,
    DbCluster,
    ScalingGroup,
}

impl ResourceKind {
    /// Label used in notification tables.
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::Ec2Instance => "EC2",
            ResourceKind::DbInstance => "RDS-Instance",
            ResourceKind::DbCluster => "RDS-Cluster",
            ResourceKind::ScalingGroup => "ASG",
        }
    }

    /// Stable token used in persisted records.
    pub fn token(&self) -> &'static str {
        match self {
            ResourceKind::Ec2Instance => "ec2",
            ResourceKind::DbInstance => "rds-instance",
            ResourceKind::DbCluster => "rds-cluster",
            ResourceKind::ScalingGroup => "asg",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ec2" => Some(ResourceKind::Ec2Instance),
            "rds-instance" => Some(ResourceKind::DbInstance),
            "rds-cluster" => Some(ResourceKind::DbCluster),
            "asg" => Some(ResourceKind::ScalingGroup),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Power state of an instance-shaped resource. Transitional provider
/// states (`pending`, `stopping`, `modifying`, ...) map to `Other` and are
/// never acted on; the next tick re-evaluates from fresh state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    Running,
    Stopped,
    Other(String),
}

/// Min/max/desired capacity of a scaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCapacity {
    pub min: i32,
    pub max: i32,
    pub desired: i32,
}

impl GroupCapacity {
    pub const ZERO: GroupCapacity = GroupCapacity {
        min: 0,
        max: 0,
        desired: 0,
    };

    pub fn describe(&self) -> String {
        format!("min={} max={} desired={}", self.min, self.max, self.desired)
    }
}

/// What the provider reported for a resource this tick.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedState {
    Power(PowerState),
    Capacity(GroupCapacity),
}

/// One resource as enumerated this invocation. Read fresh every tick,
/// never cached across invocations.
#[derive(Debug, Clone)]
pub struct ResourceRecord {
    pub id: String,
    pub kind: ResourceKind,
    pub account_id: String,
    pub region: String,
    pub state: ObservedState,
    pub tags: BTreeMap<String, String>,
}

/// The state a resource is expected to reach once an action lands.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpectedState {
    Running,
    Stopped,
    Capacity(GroupCapacity),
}

impl ExpectedState {
    pub fn matches(&self, observed: &ObservedState) -> bool {
        match (self, observed) {
            (ExpectedState::Running, ObservedState::Power(PowerState::Running)) => true,
            (ExpectedState::Stopped, ObservedState::Power(PowerState::Stopped)) => true,
            (ExpectedState::Capacity(want), ObservedState::Capacity(have)) => want == have,
            _ => false,
        }
    }

    /// Stable string encoding used by the verification store.
    pub fn encode(&self) -> String {
        match self {
            ExpectedState::Running => "running".to_string(),
            ExpectedState::Stopped => "stopped".to_string(),
            ExpectedState::Capacity(c) => format!("capacity:{}/{}/{}", c.min, c.max, c.desired),
        }
    }

    pub fn decode(raw: &str) -> Option<Self> {
        match raw {
            "running" => Some(ExpectedState::Running),
            "stopped" => Some(ExpectedState::Stopped),
            other => {
                let rest = other.strip_prefix("capacity:")?;
                let mut parts = rest.splitn(3, '/');
                let min = parts.next()?.parse().ok()?;
                let max = parts.next()?.parse().ok()?;
                let desired = parts.next()?.parse().ok()?;
                Some(ExpectedState::Capacity(GroupCapacity { min, max, desired }))
            }
        }
    }
}

impl fmt::Display for ExpectedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
