// crates/query-stats-cli/src/runner.rs
// ============================================================================
// Module: Pipeline Runner
// Description: Builds pipeline ports from configuration.
// Purpose: Create clients once per process and wire them into the pipeline.
// Dependencies: query-stats-aws, query-stats-config, query-stats-core, query-stats-store
// ============================================================================

//! ## Overview
//! [`build_pipeline`] turns a validated [`QueryStatsConfig`] into an
//! [`IngestPipeline`]. Live runs load AWS configuration once and share its
//! runtime between the EC2 lookup, the secrets source and the `MySQL` sink.
//! Dry runs touch no external system: lookups return nothing, cooldowns do
//! not sleep and rows stay in memory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use query_stats_aws::AwsContext;
use query_stats_aws::AwsSetupError;
use query_stats_aws::Ec2HostLookup;
use query_stats_aws::SecretsManagerSource;
use query_stats_config::LogTarget;
use query_stats_config::LoggingConfig;
use query_stats_config::QueryStatsConfig;
use query_stats_config::SinkConfig;
use query_stats_core::Cooldown;
use query_stats_core::EnrichmentRecord;
use query_stats_core::FilePipelineLog;
use query_stats_core::HostLookup;
use query_stats_core::InMemoryStatsSink;
use query_stats_core::IngestPipeline;
use query_stats_core::LookupError;
use query_stats_core::NoopPipelineLog;
use query_stats_core::PipelineLog;
use query_stats_core::PipelinePorts;
use query_stats_core::SinkError;
use query_stats_core::StatsSink;
use query_stats_core::StderrPipelineLog;
use query_stats_core::ThreadCooldown;
use query_stats_store::MySqlStatsSink;
use query_stats_store::SqliteStatsSink;
use thiserror::Error;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Errors raised while wiring the pipeline.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// AWS clients could not be prepared.
    #[error(transparent)]
    Aws(#[from] AwsSetupError),
    /// Sink could not be opened.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// Event log could not be opened.
    #[error("pipeline log error: {0}")]
    Log(String),
}

/// How external systems are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Real inventory lookups and the configured sink.
    Live,
    /// No external calls; rows are kept in memory.
    DryRun,
}

/// Lookup that knows no hosts.
struct EmptyInventory;

impl HostLookup for EmptyInventory {
    fn resolve(&self, _hosts: &[String]) -> Result<Vec<EnrichmentRecord>, LookupError> {
        Ok(Vec::new())
    }
}

/// Cooldown that returns immediately.
struct NoPause;

impl Cooldown for NoPause {
    fn pause(&self, _duration: Duration) {}
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds the pipeline for `config`.
///
/// # Errors
///
/// Returns [`RunnerError`] when a client, sink or log cannot be created.
pub fn build_pipeline(config: &QueryStatsConfig, mode: RunMode) -> Result<IngestPipeline, RunnerError> {
    let log = build_log(&config.logging)?;
    let ports = match mode {
        RunMode::DryRun => PipelinePorts {
            lookup: Arc::new(EmptyInventory),
            sink: Arc::new(InMemoryStatsSink::default()),
            cooldown: Arc::new(NoPause),
            log,
        },
        RunMode::Live => {
            let context = AwsContext::load(&config.aws)?;
            PipelinePorts {
                lookup: Arc::new(Ec2HostLookup::new(&context)),
                sink: build_sink(&config.sink, &context)?,
                cooldown: Arc::new(ThreadCooldown),
                log,
            }
        }
    };
    Ok(IngestPipeline::new(config.pipeline_settings(), ports))
}

/// Opens the configured sink.
fn build_sink(config: &SinkConfig, context: &AwsContext) -> Result<Arc<dyn StatsSink>, RunnerError> {
    match config {
        SinkConfig::Mysql(mysql) => {
            let secrets = Arc::new(SecretsManagerSource::new(context));
            Ok(Arc::new(MySqlStatsSink::new(mysql.clone(), secrets, context.runtime())))
        }
        SinkConfig::Sqlite(sqlite) => Ok(Arc::new(SqliteStatsSink::open(sqlite)?)),
    }
}

/// Opens the configured event log.
///
/// # Errors
///
/// Returns [`RunnerError::Log`] when the log file cannot be opened.
pub fn build_log(config: &LoggingConfig) -> Result<Arc<dyn PipelineLog>, RunnerError> {
    match (config.target, config.path.as_deref()) {
        (LogTarget::Stderr, _) => Ok(Arc::new(StderrPipelineLog)),
        (LogTarget::None, _) => Ok(Arc::new(NoopPipelineLog)),
        (LogTarget::File, Some(path)) => FilePipelineLog::new(Path::new(path))
            .map(|log| Arc::new(log) as Arc<dyn PipelineLog>)
            .map_err(|err| RunnerError::Log(err.to_string())),
        (LogTarget::File, None) => Err(RunnerError::Log("logging.path is not set".to_string())),
    }
}
