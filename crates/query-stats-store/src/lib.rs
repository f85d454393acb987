// crates/query-stats-store/src/lib.rs
// ============================================================================
// Module: Query Stats Store
// Description: Statistics sinks for MySQL and SQLite.
// Purpose: Persist query statistics rows with insert-or-increment semantics.
// Dependencies: query-stats-config, query-stats-core, rusqlite, sqlx
// ============================================================================

//! ## Overview
//! Both sinks implement [`query_stats_core::StatsSink`]. Rows are keyed on
//! [`KEY_COLUMNS`]; writing a row whose key already exists increments its
//! `query_count`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod mysql;
pub mod sqlite;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use mysql::MySqlStatsSink;
pub use sqlite::SqliteStatsSink;

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Natural-key columns of the statistics table, in insert order.
pub const KEY_COLUMNS: [&str; 8] = [
    "service_name",
    "user_name",
    "host",
    "sql_text",
    "table_name",
    "date",
    "team_name",
    "environment_name",
];
