// crates/query-stats-core/src/sql/mod.rs
// ============================================================================
// Module: Query Stats SQL Helpers
// Description: SQL text normalization and table/column extraction.
// Purpose: Reduce raw statements to a stable key and a list of touched objects.
// Dependencies: regex, sqlparser
// ============================================================================

//! ## Overview
//! Two independent helpers operate on the raw SQL field of a log line:
//! [`normalize`] strips comments and masks literal values so identical query
//! shapes aggregate under one key, and [`SqlMetadata`] reports referenced
//! tables and columns. Neither is a general SQL parser.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod metadata;
pub mod normalize;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use metadata::QueryMetadata;
pub use metadata::SqlMetadata;
pub use metadata::TokenMetadataExtractor;
pub use normalize::mask_literals;
pub use normalize::normalize;
pub use normalize::strip_comments;
