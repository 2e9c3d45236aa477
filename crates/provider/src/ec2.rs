//! EC2 instance enumeration and power actions.

use std::collections::BTreeMap;

use aws_sdk_ec2::types::Filter;
use tracing::debug;

use lightsout_core::{ObservedState, PowerState, ResourceKind, ResourceRecord, TagKeys};

use crate::error::ProviderError;
use crate::session::AccountSession;

pub struct Ec2Fleet {
    client: aws_sdk_ec2::Client,
    account_id: String,
    region: String,
}

impl Ec2Fleet {
    pub fn new(session: &AccountSession) -> Self {
        Self {
            client: session.ec2(),
            account_id: session.account_id().to_string(),
            region: session.region().to_string(),
        }
    }

    /// List instances carrying the enable tag, with tags and power state.
    ///
    /// The filter is applied server side: with an expected value it carries
    /// the configured casing plus lower/upper variants (tag filtering is
    /// case-sensitive on the API), otherwise a bare `tag-key` filter.
    pub async fn list(&self, keys: &TagKeys) -> Result<Vec<ResourceRecord>, ProviderError> {
        let mut records = Vec::new();
        let mut pages = self
            .client
            .describe_instances()
            .filters(schedule_tag_filter(keys))
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| ProviderError::List {
                kind: "EC2",
                message: format!("{e:?}"),
            })?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let Some(id) = instance.instance_id() else {
                        continue;
                    };
                    let state = instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|name| power_state(name.as_str()))
                        .unwrap_or_else(|| PowerState::Other("unknown".to_string()));
                    records.push(ResourceRecord {
                        id: id.to_string(),
                        kind: ResourceKind::Ec2Instance,
                        account_id: self.account_id.clone(),
                        region: self.region.clone(),
                        state: ObservedState::Power(state),
                        tags: tags_to_map(instance.tags()),
                    });
                }
            }
        }

        debug!(account = %self.account_id, count = records.len(), "listed EC2 instances");
        Ok(records)
    }

    pub async fn start(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .start_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    pub async fn stop(&self, id: &str) -> Result<(), ProviderError> {
        self.client
            .stop_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| ProviderError::Action {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }

    /// Re-read one instance's current power state.
    pub async fn observe(&self, id: &str) -> Result<ObservedState, ProviderError> {
        let resp = self
            .client
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|e| ProviderError::Probe {
                resource: id.to_string(),
                message: format!("{e:?}"),
            })?;

        let state = resp
            .reservations()
            .iter()
            .flat_map(|r| r.instances())
            .find(|i| i.instance_id() == Some(id))
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .map(|name| power_state(name.as_str()))
            .ok_or_else(|| ProviderError::Probe {
                resource: id.to_string(),
                message: "instance not found".to_string(),
            })?;

        Ok(ObservedState::Power(state))
    }
}

fn schedule_tag_filter(keys: &TagKeys) -> Filter {
    let expected = keys.schedule_value.trim();
    if expected.is_empty() {
        return Filter::builder()
            .name("tag-key")
            .values(keys.schedule.as_str())
            .build();
    }
    let mut filter = Filter::builder().name(format!("tag:{}", keys.schedule));
    for value in candidate_tag_values(expected) {
        filter = filter.values(value);
    }
    filter.build()
}

fn candidate_tag_values(value: &str) -> Vec<String> {
    let mut values = vec![
        value.to_string(),
        value.to_lowercase(),
        value.to_uppercase(),
    ];
    values.sort();
    values.dedup();
    values
}

fn tags_to_map(tags: &[aws_sdk_ec2::types::Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .filter_map(|t| Some((t.key()?.to_string(), t.value().unwrap_or_default().to_string())))
        .collect()
}

pub(crate) fn power_state(name: &str) -> PowerState {
    match name {
        "running" => PowerState::Running,
        "stopped" => PowerState::Stopped,
        other => PowerState::Other(other.to_string()),
    }
}
