//! Auto Scaling group enumeration and capacity actions.

use std::collections::BTreeMap;

use tracing::debug;

use lightsout_core::{GroupCapacity, ObservedState, ResourceKind, ResourceRecord};

use crate::error::ProviderError;
use crate::session::AccountSession;

pub struct AsgFleet {
    client: aws_sdk_autoscaling::Client,
    account_id: String,
    region: String,
}

impl AsgFleet {
    pub fn new(session: &AccountSession) -> Self {
        Self {
            client: session.autoscaling(),
            account_id: session.account_id().to_string(),
            region: session.region().to_string(),
        }
    }

    /// List scaling groups with tags and current capacity.
    pub async fn list(&self) -> Result<Vec<ResourceRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut pages = self
            .client
            .describe_auto_scaling_groups()
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| ProviderError::List {
                kind: "ASG",
                message: format!("{e:?}"),
            })?;
            for group in page.auto_scaling_groups() {
                let Some(name) = group.auto_scaling_group_name() else {
                    continue;
                };
                let (Some(min), Some(max), Some(desired)) =
                    (group.min_size(), group.max_size(), group.desired_capacity())
                else {
                    continue;
                };
                records.push(ResourceRecord {
                    id: name.to_string(),
                    kind: ResourceKind::ScalingGroup,
                    account_id: self.account_id.clone(),
                    region: self.region.clone(),
                    state: ObservedState::Capacity(GroupCapacity { min, max, desired }),
                    tags: tags_to_map(group.tags()),
                });
            }
        }

        debug!(account = %self.account_id, count = records.len(), "listed scaling groups");
        Ok(records)
    }

    pub async fn resize(&self, name: &str, capacity: GroupCapacity) -> Result<(), ProviderError> {
        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(name)
            .min_size(capacity.min)
            .max_size(capacity.max)
            .desired_capacity(capacity.desired)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: name.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    /// Re-read one group's current capacity.
    pub async fn observe(&self, name: &str) -> Result<ObservedState, ProviderError> {
        let resp = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .map_err(|e| ProviderError::Probe {
                resource: name.to_string(),
                message: format!("{e:?}"),
            })?;

        let group = resp
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| ProviderError::Probe {
                resource: name.to_string(),
                message: "scaling group not found".to_string(),
            })?;
        let (Some(min), Some(max), Some(desired)) =
            (group.min_size(), group.max_size(), group.desired_capacity())
        else {
            return Err(ProviderError::Probe {
                resource: name.to_string(),
                message: "scaling group reported no capacity".to_string(),
            });
        };
        Ok(ObservedState::Capacity(GroupCapacity { min, max, desired }))
    }
}

fn tags_to_map(tags: &[aws_sdk_autoscaling::types::TagDescription]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect()
}
