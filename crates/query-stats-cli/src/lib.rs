// crates/query-stats-cli/src/lib.rs
// ============================================================================
// Module: Query Stats CLI Library
// Description: Shared wiring for the query-stats binary.
// Purpose: Keep port construction testable outside the binary.
// Dependencies: query-stats-aws, query-stats-config, query-stats-core, query-stats-store
// ============================================================================

//! ## Overview
//! The binary parses arguments and performs I/O; [`runner`] owns turning a
//! configuration into a ready pipeline.

pub mod runner;
