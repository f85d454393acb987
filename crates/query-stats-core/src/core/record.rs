// crates/query-stats-core/src/core/record.rs
// ============================================================================
// Module: Query Stats Records
// Description: Parsed query statistics, enrichment results and sink rows.
// Purpose: Carry one proxy log line from parsing through persistence.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`ParsedQueryStat`] is produced 1:1 from a raw log line, updated in place
//! by enrichment, and finally flattened into a [`QueryStatRow`] for the sink.
//! Invariants:
//! - `query_count` is always 1 on a freshly parsed record.
//! - `team_name` and `environment_name` are never absent; unmatched records
//!   keep empty strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::time::LogTimestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Service name stamped on every record unless configured otherwise.
pub const DEFAULT_SERVICE_NAME: &str = "scripts-read-db";

// ============================================================================
// SECTION: Parsed Record
// ============================================================================

/// Structured form of one proxy query log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQueryStat {
    /// Configured service name.
    pub service_name: String,
    /// Database user, taken from the identity field.
    pub user_name: String,
    /// Client host IP, taken from the identity field.
    pub host: String,
    /// Normalized SQL with comments stripped and literals masked.
    pub sql_text: String,
    /// Reply time in seconds.
    pub reply_time: f64,
    /// Referenced tables in first-seen order.
    pub table_name: Vec<String>,
    /// Referenced columns in first-seen order.
    pub columns: Vec<String>,
    /// Log timestamp.
    pub date: LogTimestamp,
    /// Occurrence count contributed by this record.
    pub query_count: u32,
    /// Owning team, empty until enriched.
    pub team_name: String,
    /// Environment name, empty until enriched.
    pub environment_name: String,
}

impl ParsedQueryStat {
    /// Returns the first referenced table, or an empty string.
    #[must_use]
    pub fn primary_table(&self) -> &str {
        self.table_name.first().map_or("", String::as_str)
    }

    /// Copies ownership metadata from a matched inventory record.
    pub fn apply_enrichment(&mut self, enrichment: &EnrichmentRecord) {
        self.team_name.clone_from(&enrichment.team_name);
        self.environment_name.clone_from(&enrichment.environment_name);
    }

    /// Flattens the record into the positional sink row.
    #[must_use]
    pub fn to_row(&self) -> QueryStatRow {
        QueryStatRow {
            service_name: self.service_name.clone(),
            user_name: self.user_name.clone(),
            host: self.host.clone(),
            sql_text: self.sql_text.clone(),
            table_name: self.primary_table().to_string(),
            date: self.date,
            team_name: self.team_name.clone(),
            environment_name: self.environment_name.clone(),
            query_count: self.query_count,
        }
    }
}

// ============================================================================
// SECTION: Enrichment Record
// ============================================================================

/// Ownership metadata for one inventory instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    /// Private IP address of the instance.
    pub ip: String,
    /// Launch time rendered as `YYYY-MM-DD HH:MM:SS`, empty when unknown.
    pub launch_time: String,
    /// Value of the `c-team` tag.
    pub team_name: String,
    /// Value of the `Name` tag.
    pub environment_name: String,
}

// ============================================================================
// SECTION: Sink Row
// ============================================================================

/// Positional row persisted by a statistics sink.
///
/// # Invariants
/// - The first eight fields form the natural key; `query_count` is the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatRow {
    /// Service name.
    pub service_name: String,
    /// Database user.
    pub user_name: String,
    /// Client host IP.
    pub host: String,
    /// Normalized SQL text.
    pub sql_text: String,
    /// Primary table, empty when none was found.
    pub table_name: String,
    /// Log timestamp.
    pub date: LogTimestamp,
    /// Owning team.
    pub team_name: String,
    /// Environment name.
    pub environment_name: String,
    /// Occurrence count.
    pub query_count: u32,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
