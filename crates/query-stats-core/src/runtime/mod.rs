// crates/query-stats-core/src/runtime/mod.rs
// ============================================================================
// Module: Query Stats Runtime
// Description: Decoding, parsing, enrichment and the ingest driver.
// Purpose: Execute one log batch end to end against injected ports.
// Dependencies: crate::core, crate::interfaces, crate::sql, crate::telemetry
// ============================================================================

//! ## Overview
//! Runtime stages run sequentially on the caller's thread: decode the event,
//! parse each line, enrich by host, convert to rows, persist.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod decode;
pub mod enrichment;
pub mod parser;
pub mod pipeline;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decode::CONTROL_MESSAGE;
pub use decode::DATA_MESSAGE;
pub use decode::DEFAULT_MAX_PAYLOAD_BYTES;
pub use decode::DecodeError;
pub use decode::LogEvent;
pub use decode::LogsData;
pub use decode::decode_event;
pub use decode::decode_payload;
pub use enrichment::DEFAULT_COOLDOWN;
pub use enrichment::EnrichmentMerge;
pub use enrichment::EnrichmentSettings;
pub use enrichment::EnrichmentSummary;
pub use enrichment::HostEnrichmentJoiner;
pub use enrichment::MAX_LOOKUP_CHUNK;
pub use enrichment::divide_into_chunks;
pub use parser::DENYLIST;
pub use parser::LogRecordParser;
pub use parser::ParseError;
pub use parser::ParseFailurePolicy;
pub use parser::ParseReport;
pub use parser::ParserSettings;
pub use parser::is_denylisted;
pub use pipeline::IngestPipeline;
pub use pipeline::IngestReport;
pub use pipeline::InvocationOutcome;
pub use pipeline::PipelineError;
pub use pipeline::PipelinePorts;
pub use pipeline::PipelineSettings;
