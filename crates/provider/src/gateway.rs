//! Action gateway: one seam in front of the per-service clients.
//!
//! The executor and the verification checker depend on this trait rather
//! than on the service clients, so both can be exercised with mocks.

use async_trait::async_trait;

use lightsout_core::{GroupCapacity, ObservedState, ResourceKind};

use crate::asg::AsgFleet;
use crate::ec2::Ec2Fleet;
use crate::error::ProviderError;
use crate::rds::RdsFleet;
use crate::session::AccountSession;

/// Start/stop/resize/observe operations against one account's resources.
#[async_trait]
pub trait ResourceGateway: Send + Sync {
    async fn start(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError>;
    async fn stop(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError>;
    async fn resize(&self, id: &str, capacity: GroupCapacity) -> Result<(), ProviderError>;
    /// Re-read one resource's live state.
    async fn observe(&self, kind: ResourceKind, id: &str) -> Result<ObservedState, ProviderError>;
}

/// Gateway over the real per-service clients for one account session.
pub struct AccountGateway {
    ec2: Ec2Fleet,
    rds: RdsFleet,
    asg: AsgFleet,
}

impl AccountGateway {
    pub fn new(session: &AccountSession) -> Self {
        Self {
            ec2: Ec2Fleet::new(session),
            rds: RdsFleet::new(session),
            asg: AsgFleet::new(session),
        }
    }
}

#[async_trait]
impl ResourceGateway for AccountGateway {
    async fn start(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Ec2Instance => self.ec2.start(id).await,
            ResourceKind::DbInstance => self.rds.start_instance(id).await,
            ResourceKind::DbCluster => self.rds.start_cluster(id).await,
            ResourceKind::ScalingGroup => Err(ProviderError::Action {
                resource: id.to_string(),
                message: "scaling groups are resized, not started".to_string(),
            }),
        }
    }

    async fn stop(&self, kind: ResourceKind, id: &str) -> Result<(), ProviderError> {
        match kind {
            ResourceKind::Ec2Instance => self.ec2.stop(id).await,
            ResourceKind::DbInstance => self.rds.stop_instance(id).await,
            ResourceKind::DbCluster => self.rds.stop_cluster(id).await,
            ResourceKind::ScalingGroup => Err(ProviderError::Action {
                resource: id.to_string(),
                message: "scaling groups are resized, not stopped".to_string(),
            }),
        }
    }

    async fn resize(&self, id: &str, capacity: GroupCapacity) -> Result<(), ProviderError> {
        self.asg.resize(id, capacity).await
    }

    async fn observe(&self, kind: ResourceKind, id: &str) -> Result<ObservedState, ProviderError> {
        match kind {
            ResourceKind::Ec2Instance => self.ec2.observe(id).await,
            ResourceKind::DbInstance => self.rds.observe_instance(id).await,
            ResourceKind::DbCluster => self.rds.observe_cluster(id).await,
            ResourceKind::ScalingGroup => self.asg.observe(id).await,
        }
    }
}
