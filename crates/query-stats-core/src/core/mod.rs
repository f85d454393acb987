// crates/query-stats-core/src/core/mod.rs
// ============================================================================
// Module: Query Stats Core Types
// Description: Canonical record types for parsed, enriched and persisted stats.
// Purpose: Provide stable, serializable types shared by every pipeline stage.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types describe a query log line after parsing ([`ParsedQueryStat`]),
//! the ownership metadata returned by the inventory lookup
//! ([`EnrichmentRecord`]) and the positional tuple written to the sink
//! ([`QueryStatRow`]).

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod record;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use record::DEFAULT_SERVICE_NAME;
pub use record::EnrichmentRecord;
pub use record::ParsedQueryStat;
pub use record::QueryStatRow;
pub use time::LogTimestamp;
pub use time::TimestampError;
