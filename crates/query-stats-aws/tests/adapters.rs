//! AWS adapter boundary tests.
//!
//! ## Purpose
//! Check the adapters' local guards without reaching AWS: contexts load from
//! explicit overrides and lookups reject chunks the EC2 filter cannot carry.
// crates/query-stats-aws/tests/adapters.rs
// ============================================================================
// Module: AWS Adapter Tests
// Description: Offline checks for context loading and lookup guards.
// Purpose: Validate adapter behavior that does not require network access.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions are permitted."
)]

use query_stats_aws::AwsContext;
use query_stats_aws::Ec2HostLookup;
use query_stats_config::AwsConfig;
use query_stats_core::HostLookup;
use query_stats_core::LookupError;

fn offline_context() -> AwsContext {
    let config = AwsConfig {
        region: Some("eu-west-1".to_string()),
        endpoint: Some("http://127.0.0.1:9".to_string()),
        allow_http: true,
    };
    AwsContext::load(&config).unwrap()
}

#[test]
fn context_applies_region_override() {
    let context = offline_context();
    let region = context.sdk_config().region().map(ToString::to_string);
    assert_eq!(region.as_deref(), Some("eu-west-1"));
}

#[test]
fn empty_chunk_resolves_without_a_call() {
    let lookup = Ec2HostLookup::new(&offline_context());
    assert!(lookup.resolve(&[]).unwrap().is_empty());
}

#[test]
fn oversized_chunk_is_rejected_locally() {
    let lookup = Ec2HostLookup::new(&offline_context());
    let hosts: Vec<String> = (0 .. 201).map(|index| format!("10.0.{}.{}", index / 250, index % 250)).collect();
    let err = lookup.resolve(&hosts).unwrap_err();
    assert!(matches!(err, LookupError::Invalid(_)), "unexpected error {err:?}");
}
