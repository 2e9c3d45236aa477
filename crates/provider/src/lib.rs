//! Cross-account AWS access: assume-role sessions, resource enumeration,
//! and the action gateway the executor and verifier drive.

pub mod asg;
pub mod ec2;
pub mod error;
pub mod gateway;
pub mod rds;
pub mod session;

pub use asg::AsgFleet;
pub use ec2::Ec2Fleet;
pub use error::ProviderError;
pub use gateway::{AccountGateway, ResourceGateway};
pub use rds::RdsFleet;
pub use session::{base_sts_client, AccountSession, StsClient};
