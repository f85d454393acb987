// crates/query-stats-aws/src/lib.rs
// ============================================================================
// Module: Query Stats AWS Adapters
// Description: EC2 inventory lookup and Secrets Manager credential source.
// Purpose: Implement the inventory and secrets ports against AWS.
// Dependencies: aws-config, aws-sdk-ec2, aws-sdk-secretsmanager, query-stats-core
// ============================================================================

//! ## Overview
//! Synchronous adapters over the async AWS SDK. An [`AwsContext`] is loaded
//! once per process and both adapters are built from it, sharing one private
//! runtime.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod context;
pub mod ec2;
pub mod secrets;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use context::AwsContext;
pub use context::AwsSetupError;
pub use ec2::Ec2HostLookup;
pub use ec2::instance_record;
pub use secrets::SecretsManagerSource;
pub use secrets::parse_credentials;
