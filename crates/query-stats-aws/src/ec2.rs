// crates/query-stats-aws/src/ec2.rs
// ============================================================================
// Module: EC2 Host Lookup
// Description: Resolves private IPs to instance ownership via DescribeInstances.
// Purpose: Implement the inventory port against EC2.
// Dependencies: aws-sdk-ec2, query-stats-core
// ============================================================================

//! ## Overview
//! One `DescribeInstances` call per chunk, filtered on `private-ip-address`,
//! following `next_token` until the listing is exhausted. Each instance with a
//! private IP becomes one [`EnrichmentRecord`]: the `c-team` tag is the team,
//! the `Name` tag is the environment, and the launch time is rendered in the
//! log timestamp format.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use aws_sdk_ec2::Client;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use aws_sdk_ec2::types::Instance;
use query_stats_core::BlockingRuntime;
use query_stats_core::EnrichmentRecord;
use query_stats_core::HostLookup;
use query_stats_core::LogTimestamp;
use query_stats_core::LookupError;
use query_stats_core::runtime::MAX_LOOKUP_CHUNK;

use crate::context::AwsContext;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `DescribeInstances` filter name for private IPs.
pub const PRIVATE_IP_FILTER: &str = "private-ip-address";
/// Tag carrying the owning team.
pub const TEAM_TAG: &str = "c-team";
/// Tag carrying the environment name.
pub const ENVIRONMENT_TAG: &str = "Name";

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// EC2-backed [`HostLookup`].
pub struct Ec2HostLookup {
    /// EC2 client.
    client: Client,
    /// Runtime driving SDK futures.
    runtime: Arc<BlockingRuntime>,
}

impl Ec2HostLookup {
    /// Builds the lookup from a loaded context.
    #[must_use]
    pub fn new(context: &AwsContext) -> Self {
        Self {
            client: Client::new(context.sdk_config()),
            runtime: context.runtime(),
        }
    }
}

impl HostLookup for Ec2HostLookup {
    fn resolve(&self, hosts: &[String]) -> Result<Vec<EnrichmentRecord>, LookupError> {
        if hosts.is_empty() {
            return Ok(Vec::new());
        }
        if hosts.len() > MAX_LOOKUP_CHUNK {
            return Err(LookupError::Invalid(format!(
                "{} hosts exceeds the {MAX_LOOKUP_CHUNK} filter value limit",
                hosts.len()
            )));
        }
        let client = self.client.clone();
        let values = hosts.to_vec();
        self.runtime.block_on(
            async move {
                let mut records = Vec::new();
                let mut next_token: Option<String> = None;
                loop {
                    let filter =
                        Filter::builder().name(PRIVATE_IP_FILTER).set_values(Some(values.clone())).build();
                    let output = client
                        .describe_instances()
                        .filters(filter)
                        .set_next_token(next_token.take())
                        .send()
                        .await
                        .map_err(|err| LookupError::Backend(DisplayErrorContext(&err).to_string()))?;
                    for reservation in output.reservations() {
                        records.extend(reservation.instances().iter().filter_map(instance_record));
                    }
                    match output.next_token() {
                        Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                        _ => break,
                    }
                }
                Ok(records)
            },
            LookupError::Backend,
        )
    }
}

// ============================================================================
// SECTION: Mapping
// ============================================================================

/// Maps an instance to an enrichment record; instances without a private IP
/// are skipped.
#[must_use]
pub fn instance_record(instance: &Instance) -> Option<EnrichmentRecord> {
    let ip = instance.private_ip_address().filter(|ip| !ip.is_empty())?;
    let launch_time = instance
        .launch_time()
        .and_then(|launched| LogTimestamp::from_unix_seconds(launched.secs()).ok())
        .map(|launched| launched.to_string())
        .unwrap_or_default();
    let mut record = EnrichmentRecord {
        ip: ip.to_string(),
        launch_time,
        team_name: String::new(),
        environment_name: String::new(),
    };
    for tag in instance.tags() {
        let value = tag.value().unwrap_or_default().to_string();
        match tag.key() {
            Some(ENVIRONMENT_TAG) => record.environment_name = value,
            Some(TEAM_TAG) => record.team_name = value,
            _ => {}
        }
    }
    Some(record)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test fixtures use unwraps for clarity.")]

    use aws_sdk_ec2::primitives::DateTime;
    use aws_sdk_ec2::types::Instance;
    use aws_sdk_ec2::types::Tag;

    use super::instance_record;

    fn tag(key: &str, value: &str) -> Tag {
        Tag::builder().key(key).value(value).build()
    }

    #[test]
    fn maps_tags_and_launch_time() {
        let instance = Instance::builder()
            .private_ip_address("10.0.0.5")
            .launch_time(DateTime::from_secs(1_682_928_000))
            .tags(tag("Name", "prod"))
            .tags(tag("c-team", "core"))
            .tags(tag("owner", "ignored"))
            .build();

        let record = instance_record(&instance).unwrap();

        assert_eq!(record.ip, "10.0.0.5");
        assert_eq!(record.launch_time, "2023-05-01 08:00:00");
        assert_eq!(record.team_name, "core");
        assert_eq!(record.environment_name, "prod");
    }

    #[test]
    fn missing_tags_leave_empty_strings() {
        let instance = Instance::builder().private_ip_address("10.0.0.9").build();
        let record = instance_record(&instance).unwrap();
        assert!(record.launch_time.is_empty());
        assert!(record.team_name.is_empty());
        assert!(record.environment_name.is_empty());
    }

    #[test]
    fn instance_without_private_ip_is_skipped() {
        let instance = Instance::builder().tags(tag("Name", "prod")).build();
        assert!(instance_record(&instance).is_none());
    }
}
