// crates/query-stats-aws/src/context.rs
// ============================================================================
// Module: AWS Context
// Description: Shared SDK configuration and blocking runtime for AWS adapters.
// Purpose: Load AWS configuration once at cold start and reuse it.
// Dependencies: aws-config, query-stats-config, query-stats-core
// ============================================================================

//! ## Overview
//! [`AwsContext`] loads the shared SDK configuration (region, endpoint
//! override, credentials chain) on a private runtime. The EC2 and Secrets
//! Manager adapters are built from the same context so both clients share the
//! runtime and resolved credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_config::SdkConfig;
use query_stats_config::AwsConfig;
use query_stats_core::BlockingRuntime;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while preparing AWS clients.
#[derive(Debug, Error)]
pub enum AwsSetupError {
    /// Runtime could not be started or driven.
    #[error("aws runtime error: {0}")]
    Runtime(String),
}

// ============================================================================
// SECTION: Context
// ============================================================================

/// Shared AWS configuration and runtime.
#[derive(Clone)]
pub struct AwsContext {
    /// Runtime driving SDK futures.
    runtime: Arc<BlockingRuntime>,
    /// Resolved SDK configuration.
    shared: SdkConfig,
}

impl AwsContext {
    /// Loads SDK configuration from the environment plus overrides.
    ///
    /// # Errors
    ///
    /// Returns [`AwsSetupError`] when the runtime cannot be started.
    pub fn load(config: &AwsConfig) -> Result<Self, AwsSetupError> {
        let runtime = BlockingRuntime::new().map_err(|err| AwsSetupError::Runtime(err.to_string()))?;
        let region = config.region.clone();
        let endpoint = config.endpoint.clone();
        let shared = runtime.block_on(
            async move {
                let mut loader = aws_config::defaults(BehaviorVersion::latest());
                if let Some(region) = region {
                    loader = loader.region(Region::new(region));
                }
                if let Some(endpoint) = endpoint {
                    loader = loader.endpoint_url(endpoint);
                }
                Ok(loader.load().await)
            },
            AwsSetupError::Runtime,
        )?;
        Ok(Self {
            runtime: Arc::new(runtime),
            shared,
        })
    }

    /// Returns the shared SDK configuration.
    #[must_use]
    pub const fn sdk_config(&self) -> &SdkConfig {
        &self.shared
    }

    /// Returns the shared runtime.
    #[must_use]
    pub fn runtime(&self) -> Arc<BlockingRuntime> {
        Arc::clone(&self.runtime)
    }
}
