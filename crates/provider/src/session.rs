//! Cross-account credential sessions.
//!
//! One STS `AssumeRole` per account per invocation. The resulting static
//! credentials are scoped to that account's processing and dropped at the
//! end of it; they are never shared across accounts or invocations.

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use tracing::info;

use lightsout_core::AccountConfig;

use crate::error::ProviderError;

pub type StsClient = aws_sdk_sts::Client;

const SESSION_NAME: &str = "lightsout-scheduler";

/// STS client on the host environment's own credential chain, used to
/// assume into each configured account.
pub async fn base_sts_client() -> StsClient {
    let cfg = aws_config::defaults(BehaviorVersion::latest()).load().await;
    aws_sdk_sts::Client::new(&cfg)
}

/// Scoped credentials for one account's processing.
#[derive(Debug, Clone)]
pub struct AccountSession {
    account_id: String,
    region: String,
    credentials: Credentials,
}

impl AccountSession {
    /// Assume the account's scheduler role and capture its credentials.
    pub async fn assume(sts: &StsClient, account: &AccountConfig) -> Result<Self, ProviderError> {
        let role_arn = account.role_arn();
        let resp = sts
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(SESSION_NAME)
            .send()
            .await
            .map_err(|e| ProviderError::AssumeRole {
                account: account.account_id.clone(),
                message: format!("{e:?}"),
            })?;

        let creds = resp.credentials().ok_or_else(|| ProviderError::AssumeRole {
            account: account.account_id.clone(),
            message: "assume role response carried no credentials".to_string(),
        })?;

        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            None,
            SESSION_NAME,
        );

        info!(account = %account.account_id, role = %role_arn, "assumed scheduler role");

        Ok(Self {
            account_id: account.account_id.clone(),
            region: account.region.clone(),
            credentials,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// EC2 client scoped to this account and region.
    pub fn ec2(&self) -> aws_sdk_ec2::Client {
        let conf = aws_sdk_ec2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_ec2::config::Region::new(self.region.clone()))
            .credentials_provider(self.credentials.clone())
            .build();
        aws_sdk_ec2::Client::from_conf(conf)
    }

    /// RDS client scoped to this account and region.
    pub fn rds(&self) -> aws_sdk_rds::Client {
        let conf = aws_sdk_rds::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_rds::config::Region::new(self.region.clone()))
            .credentials_provider(self.credentials.clone())
            .build();
        aws_sdk_rds::Client::from_conf(conf)
    }

    /// Auto Scaling client scoped to this account and region.
    pub fn autoscaling(&self) -> aws_sdk_autoscaling::Client {
        let conf = aws_sdk_autoscaling::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_sdk_autoscaling::config::Region::new(self.region.clone()))
            .credentials_provider(self.credentials.clone())
            .build();
        aws_sdk_autoscaling::Client::from_conf(conf)
    }
}
