// crates/query-stats-config/src/lib.rs
// ============================================================================
// Module: Query Stats Config Library
// Description: Configuration model and validation for the ingest pipeline.
// Purpose: Single source of truth for query-stats.toml semantics.
// Dependencies: query-stats-core, serde, toml
// ============================================================================

//! ## Overview
//! `query-stats-config` defines the `query-stats.toml` model, resolves and
//! loads it with strict limits, and converts it into runtime
//! [`query_stats_core::PipelineSettings`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
