// crates/query-stats-core/src/lib.rs
// ============================================================================
// Module: Query Stats Core
// Description: Domain model and processing pipeline for proxy query logs.
// Purpose: Turn CloudWatch log batches into enriched query-statistics rows.
// Dependencies: serde, thiserror, time, regex, sqlparser, base64, flate2, tokio
// ============================================================================

//! ## Overview
//! Query Stats core owns the pure half of the ingestion pipeline: decoding a
//! CloudWatch Logs subscription event, parsing pipe-delimited MaxScale query log
//! lines, normalizing SQL text, extracting table and column names, and joining
//! ownership metadata looked up by host IP back onto each record.
//!
//! Everything that talks to the outside world is expressed as a trait in
//! [`interfaces`]: the inventory lookup, the credential source, the statistics
//! sink, the cooldown clock, and the pipeline log. Adapter crates implement
//! those traits; this crate never performs network or database I/O itself.
//!
//! Invariants:
//! - Every emitted record carries `query_count == 1`.
//! - `team_name` and `environment_name` are empty strings until matched.
//! - Records whose normalized SQL contains a denylisted fragment are dropped.
//! - Raw SQL text is never written to the pipeline log.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod blocking;
pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod sql;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use blocking::BlockingRuntime;
pub use crate::core::DEFAULT_SERVICE_NAME;
pub use crate::core::EnrichmentRecord;
pub use crate::core::LogTimestamp;
pub use crate::core::ParsedQueryStat;
pub use crate::core::QueryStatRow;
pub use interfaces::Cooldown;
pub use interfaces::DatabaseCredentials;
pub use interfaces::HostLookup;
pub use interfaces::InMemoryStatsSink;
pub use interfaces::LookupError;
pub use interfaces::SecretsError;
pub use interfaces::SecretsSource;
pub use interfaces::SinkError;
pub use interfaces::StatsSink;
pub use interfaces::ThreadCooldown;
pub use runtime::DecodeError;
pub use runtime::EnrichmentMerge;
pub use runtime::EnrichmentSettings;
pub use runtime::EnrichmentSummary;
pub use runtime::HostEnrichmentJoiner;
pub use runtime::IngestPipeline;
pub use runtime::IngestReport;
pub use runtime::InvocationOutcome;
pub use runtime::LogEvent;
pub use runtime::LogRecordParser;
pub use runtime::LogsData;
pub use runtime::ParseError;
pub use runtime::ParseFailurePolicy;
pub use runtime::ParseReport;
pub use runtime::ParserSettings;
pub use runtime::PipelineError;
pub use runtime::PipelinePorts;
pub use runtime::PipelineSettings;
pub use runtime::decode_event;
pub use runtime::decode_payload;
pub use runtime::divide_into_chunks;
pub use sql::QueryMetadata;
pub use sql::SqlMetadata;
pub use sql::TokenMetadataExtractor;
pub use sql::normalize;
pub use telemetry::FilePipelineLog;
pub use telemetry::MemoryPipelineLog;
pub use telemetry::NoopPipelineLog;
pub use telemetry::PipelineEvent;
pub use telemetry::PipelineEventKind;
pub use telemetry::PipelineLog;
pub use telemetry::StderrPipelineLog;
