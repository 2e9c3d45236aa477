//! RDS instance and cluster enumeration and power actions.
//!
//! Clusters and standalone instances share the same tag contract but are
//! enumerated and driven through separate API operations. An instance that
//! belongs to a cluster is skipped; the cluster is the scheduling unit.

use std::collections::BTreeMap;

use tracing::debug;

use lightsout_core::{ObservedState, PowerState, ResourceKind, ResourceRecord};

use crate::error::ProviderError;
use crate::session::AccountSession;

pub struct RdsFleet {
    client: aws_sdk_rds::Client,
    account_id: String,
    region: String,
}

impl RdsFleet {
    pub fn new(session: &AccountSession) -> Self {
        Self {
            client: session.rds(),
            account_id: session.account_id().to_string(),
            region: session.region().to_string(),
        }
    }

    /// List standalone DB instances with tags and status.
    pub async fn list_instances(&self) -> Result<Vec<ResourceRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut pages = self.client.describe_db_instances().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| ProviderError::List {
                kind: "RDS-Instance",
                message: format!("{e:?}"),
            })?;
            for instance in page.db_instances() {
                if instance.db_cluster_identifier().is_some() {
                    continue;
                }
                let Some(id) = instance.db_instance_identifier() else {
                    continue;
                };
                records.push(ResourceRecord {
                    id: id.to_string(),
                    kind: ResourceKind::DbInstance,
                    account_id: self.account_id.clone(),
                    region: self.region.clone(),
                    state: ObservedState::Power(db_power_state(
                        instance.db_instance_status().unwrap_or("unknown"),
                    )),
                    tags: tag_list_to_map(instance.tag_list()),
                });
            }
        }

        debug!(account = %self.account_id, count = records.len(), "listed RDS instances");
        Ok(records)
    }

    /// List DB clusters with tags and status.
    pub async fn list_clusters(&self) -> Result<Vec<ResourceRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut pages = self.client.describe_db_clusters().into_paginator().send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| ProviderError::List {
                kind: "RDS-Cluster",
                message: format!("{e:?}"),
            })?;
            for cluster in page.db_clusters() {
                let Some(id) = cluster.db_cluster_identifier() else {
                    continue;
                };
                records.push(ResourceRecord {
                    id: id.to_string(),
                    kind: ResourceKind::DbCluster,
                    account_id: self.account_id.clone(),
                    region: self.region.clone(),
                    state: ObservedState::Power(db_power_state(
                        cluster.status().unwrap_or("unknown"),
                    )),
                    tags: tag_list_to_map(cluster.tag_list()),
                });
            }
        }

        debug!(account = %self.account_id, count = records.len(), "listed RDS clusters");
        Ok(records)
    }

    pub async fn start_instance(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .start_db_instance()
            .db_instance_identifier(id)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    pub async fn stop_instance(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .stop_db_instance()
            .db_instance_identifier(id)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    pub async fn start_cluster(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .start_db_cluster()
            .db_cluster_identifier(id)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    pub async fn stop_cluster(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .stop_db_cluster()
            .db_cluster_identifier(id)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    /// Re-read one instance's current status.
    pub async fn observe_instance(&self, id: &str) -> Result<ObservedState, ProviderError> {
        let resp = self
            .client
            .describe_db_instances()
            .db_instance_identifier(id)
            .send()
            .await
            .map_err(|e| ProviderError::Probe {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        let status = resp
            .db_instances()
            .first()
            .and_then(|i| i.db_instance_status())
            .ok_or_else(|| ProviderError::Probe {
                resource: id.to_string(),
                message: "instance not found".to_string(),
            })?;
        Ok(ObservedState::Power(db_power_state(status)))
    }

    /// Re-read one cluster's current status.
    pub async fn observe_cluster(&self, id: &str) -> Result<ObservedState, ProviderError> {
        let resp = self
            .client
            .describe_db_clusters()
            .db_cluster_identifier(id)
            .send()
            .await
            .map_err(|e| ProviderError::Probe {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        let status = resp
            .db_clusters()
            .first()
            .and_then(|c| c.status())
            .ok_or_else(|| ProviderError::Probe {
                resource: id.to_string(),
                message: "cluster not found".to_string(),
            })?;
        Ok(ObservedState::Power(db_power_state(status)))
    }
}

/// RDS reports a running database as `available`.
fn db_power_state(status: &str) -> PowerState {
    match status {
        "available" => PowerState::Running,
        "stopped" => PowerState::Stopped,
        other => PowerState::Other(other.to_string()),
    }
}

fn tag_list_to_map(tags: &[aws_sdk_rds::types::Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_power_state_mapping() {
        assert_eq!(db_power_state("available"), PowerState::Running);
        assert_eq!(db_power_state("stopped"), PowerState::Stopped);
        assert_eq!(
            db_power_state("backing-up"),
            PowerState::Other("backing-up".to_string())
        );
    }
}
