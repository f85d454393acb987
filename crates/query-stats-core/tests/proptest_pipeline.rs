//! Property-based tests for normalization, filtering and chunking.
//!
//! ## Purpose
//! Exercise the pure pipeline helpers with generated inputs so their
//! invariants hold beyond hand-picked examples.
//!
//! ## What is covered
//! - `normalize` is idempotent and leaves no digits or quoted literals.
//! - Denylisted statements never survive parsing.
//! - Chunking preserves order, respects the bound and covers every host once.
//! - Metadata extraction never panics on arbitrary text.
// crates/query-stats-core/tests/proptest_pipeline.rs
// ============================================================================
// Module: Pipeline Property-Based Tests
// Description: Generated-input checks for pure pipeline helpers.
// Purpose: Ensure helpers keep their invariants on arbitrary inputs.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use query_stats_core::LogRecordParser;
use query_stats_core::ParserSettings;
use query_stats_core::SqlMetadata;
use query_stats_core::TokenMetadataExtractor;
use query_stats_core::divide_into_chunks;
use query_stats_core::normalize;
use query_stats_core::runtime::DENYLIST;
use query_stats_core::runtime::is_denylisted;
use query_stats_core::sql::strip_comments;

proptest! {
    #[test]
    fn normalize_is_idempotent(sql in "[ -~\n]{0,80}") {
        let once = normalize(&sql);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn normalize_masks_every_digit(sql in "[a-zA-Z0-9 =,'()*]{0,60}") {
        let normalized = normalize(&sql);
        prop_assert!(!normalized.chars().any(|ch| ch.is_ascii_digit()));
    }

    #[test]
    fn quoted_literals_are_fully_masked(
        prefix in "[a-zA-Z =]{0,20}",
        literal in "[a-zA-Z0-9 ]{0,20}",
        suffix in "[a-zA-Z =]{0,20}",
    ) {
        let sql = format!("{prefix}'{literal}'{suffix}");
        let stripped = strip_comments(&sql);
        let normalized = normalize(&sql);
        prop_assert!(!normalized.contains('\''));
        prop_assert_eq!(normalized.matches('?').count() >= 1, stripped.contains('\''));
    }

    #[test]
    fn denylisted_statements_never_survive(index in 0usize .. DENYLIST.len(), tail in "[a-z ]{0,20}") {
        let fragment = DENYLIST[index];
        let sql = format!("{fragment}{tail}");
        let line = format!("svc|x|2024-01-01 10:00:00|u_:db:schema:10.0.0.1|0.1|{sql}");
        let parser = LogRecordParser::new(ParserSettings::default());
        let report = parser.parse([line.as_str()]).unwrap();
        for record in &report.records {
            prop_assert!(!is_denylisted(&record.sql_text));
        }
    }

    #[test]
    fn chunks_cover_hosts_in_order(count in 0usize .. 700, size in 1usize .. 250) {
        let hosts: Vec<String> = (0 .. count).map(|index| format!("10.{}.{}.1", index / 256, index % 256)).collect();
        let chunks = divide_into_chunks(&hosts, size);
        prop_assert_eq!(chunks.len(), count.div_ceil(size));
        prop_assert!(chunks.iter().all(|chunk| !chunk.is_empty() && chunk.len() <= size));
        prop_assert_eq!(chunks.concat(), hosts);
    }

    #[test]
    fn metadata_extraction_never_panics(sql in ".{0,120}") {
        let metadata = TokenMetadataExtractor.extract(&sql);
        let mut tables = metadata.tables.clone();
        tables.dedup();
        prop_assert_eq!(tables.len(), metadata.tables.len());
    }
}
