// crates/query-stats-core/src/runtime/parser.rs
// ============================================================================
// Module: Log Record Parser
// Description: Pipe-delimited proxy log line parsing and noise filtering.
// Purpose: Produce one ParsedQueryStat per log line, minus denylisted queries.
// Dependencies: crate::core, crate::sql, serde, thiserror
// ============================================================================

//! ## Overview
//! A MaxScale query log line carries six `|`-separated fields:
//! service tag, an unused field, the timestamp, the `user:db:schema:host`
//! identity, the reply time in seconds, and the raw SQL. Only the first five
//! delimiters split; the SQL keeps any pipes it contains. Some proxy versions
//! write the reply time before the identity, so the two fields are swapped
//! back when their shapes say so.
//!
//! Parsed records whose normalized SQL contains a [`DENYLIST`] fragment are
//! dropped. The parser never logs; callers receive a [`ParseReport`] with
//! rejected lines and the filtered count.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::DEFAULT_SERVICE_NAME;
use crate::core::LogTimestamp;
use crate::core::ParsedQueryStat;
use crate::sql::SqlMetadata;
use crate::sql::TokenMetadataExtractor;
use crate::sql::normalize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of fields a log line splits into.
pub const LOG_FIELD_COUNT: usize = 6;

/// Minimum colon-separated segments in the identity field.
const IDENTITY_SEGMENTS: usize = 4;

/// Case-sensitive fragments marking driver and session housekeeping queries.
pub const DENYLIST: [&str; 11] = [
    "DROP TABLE `",
    "SELECT @@collation_database;",
    "SELECT CONNECTION_ID()",
    "set @@sql_select_limit=?",
    "SELECT @@session.transaction_isolation",
    "commit",
    "set session transaction read only",
    "SELECT @@session.transaction_read_only",
    "SELECT ?",
    "set session transaction read write",
    "SET ",
];

/// Returns true when normalized SQL contains any denylisted fragment.
#[must_use]
pub fn is_denylisted(sql_text: &str) -> bool {
    DENYLIST.iter().any(|fragment| sql_text.contains(fragment))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Structural errors for a single log line.
///
/// # Invariants
/// - `line` is the zero-based index of the line within its batch.
/// - Messages never include SQL text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than six `|`-separated fields.
    #[error("line {line}: expected 6 fields, found {found}")]
    MissingFields {
        /// Line index.
        line: usize,
        /// Fields present.
        found: usize,
    },
    /// Identity field has fewer than four `:` segments.
    #[error("line {line}: identity field has fewer than 4 segments")]
    Identity {
        /// Line index.
        line: usize,
    },
    /// Timestamp is not `YYYY-MM-DD HH:MM:SS`.
    #[error("line {line}: invalid timestamp {value}")]
    Timestamp {
        /// Line index.
        line: usize,
        /// Offending field.
        value: String,
    },
    /// Reply time is not a decimal number.
    #[error("line {line}: invalid reply time {value}")]
    ReplyTime {
        /// Line index.
        line: usize,
        /// Offending field.
        value: String,
    },
}

impl ParseError {
    /// Returns the zero-based line index the error refers to.
    #[must_use]
    pub const fn line(&self) -> usize {
        match self {
            Self::MissingFields {
                line, ..
            }
            | Self::Identity {
                line,
            }
            | Self::Timestamp {
                line, ..
            }
            | Self::ReplyTime {
                line, ..
            } => *line,
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// What a malformed line does to its batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailurePolicy {
    /// The first malformed line fails the whole batch.
    #[default]
    FailBatch,
    /// Malformed lines are reported and skipped.
    SkipRecord,
}

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserSettings {
    /// Service name stamped on every record.
    pub service_name: String,
    /// Malformed line handling.
    pub failure_policy: ParseFailurePolicy,
}

impl Default for ParserSettings {
    fn default() -> Self {
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            failure_policy: ParseFailurePolicy::default(),
        }
    }
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Outcome of parsing one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseReport {
    /// Records that survived the denylist, in input order.
    pub records: Vec<ParsedQueryStat>,
    /// Lines skipped under [`ParseFailurePolicy::SkipRecord`].
    pub rejected: Vec<ParseError>,
    /// Parsed records dropped by the denylist.
    pub filtered: usize,
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Parses proxy query log lines into [`ParsedQueryStat`] records.
pub struct LogRecordParser {
    /// Parser settings.
    settings: ParserSettings,
    /// Table/column extractor.
    metadata: Box<dyn SqlMetadata>,
}

impl LogRecordParser {
    /// Creates a parser using the token-based metadata extractor.
    #[must_use]
    pub fn new(settings: ParserSettings) -> Self {
        Self::with_metadata(settings, Box::new(TokenMetadataExtractor))
    }

    /// Creates a parser with a custom metadata extractor.
    #[must_use]
    pub fn with_metadata(settings: ParserSettings, metadata: Box<dyn SqlMetadata>) -> Self {
        Self {
            settings,
            metadata,
        }
    }

    /// Parses a batch of lines and applies the denylist.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] under [`ParseFailurePolicy::FailBatch`].
    pub fn parse<'a, I>(&self, lines: I) -> Result<ParseReport, ParseError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut report = ParseReport::default();
        for (index, line) in lines.into_iter().enumerate() {
            match self.parse_line(index, line) {
                Ok(record) if is_denylisted(&record.sql_text) => report.filtered += 1,
                Ok(record) => report.records.push(record),
                Err(err) => match self.settings.failure_policy {
                    ParseFailurePolicy::FailBatch => return Err(err),
                    ParseFailurePolicy::SkipRecord => report.rejected.push(err),
                },
            }
        }
        Ok(report)
    }

    /// Parses one line without applying the denylist.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when a field is missing or malformed.
    pub fn parse_line(&self, index: usize, line: &str) -> Result<ParsedQueryStat, ParseError> {
        let fields: Vec<&str> = line.splitn(LOG_FIELD_COUNT, '|').collect();
        let [_, _, raw_date, third, fourth, raw_sql] = fields.as_slice() else {
            return Err(ParseError::MissingFields {
                line: index,
                found: fields.len(),
            });
        };
        let (identity, raw_reply) = if is_swapped_layout(third, fourth) {
            (*fourth, *third)
        } else {
            (*third, *fourth)
        };

        let segments: Vec<&str> = identity.split(':').collect();
        let [user_segment, _, _, host, ..] = segments.as_slice() else {
            return Err(ParseError::Identity {
                line: index,
            });
        };
        let date = LogTimestamp::parse(raw_date).map_err(|_| ParseError::Timestamp {
            line: index,
            value: (*raw_date).to_string(),
        })?;
        let reply_time = raw_reply.trim().parse::<f64>().map_err(|_| ParseError::ReplyTime {
            line: index,
            value: raw_reply.to_string(),
        })?;
        let metadata = self.metadata.extract(raw_sql);

        Ok(ParsedQueryStat {
            service_name: self.settings.service_name.clone(),
            user_name: drop_last_char(user_segment).to_string(),
            host: (*host).to_string(),
            sql_text: normalize(raw_sql),
            reply_time,
            table_name: metadata.tables,
            columns: metadata.columns,
            date,
            query_count: 1,
            team_name: String::new(),
            environment_name: String::new(),
        })
    }
}

/// Returns true when field 3 holds the reply time and field 4 the identity.
fn is_swapped_layout(third: &str, fourth: &str) -> bool {
    third.trim().parse::<f64>().is_ok() && fourth.split(':').count() >= IDENTITY_SEGMENTS
}

/// Drops the trailing character of the identity user segment.
fn drop_last_char(value: &str) -> &str {
    let mut chars = value.chars();
    chars.next_back();
    chars.as_str()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::panic,
        reason = "Test fixtures use unwraps and panics for clarity."
    )]

    use super::DENYLIST;
    use super::LogRecordParser;
    use super::ParseError;
    use super::ParseFailurePolicy;
    use super::ParserSettings;
    use super::is_denylisted;

    const EXAMPLE: &str = "scripts-read-db|x|2024-01-01 10:00:00|0.5|alice_:db:schema:10.0.0.5|SELECT * FROM users WHERE id = '5'";

    fn parser(policy: ParseFailurePolicy) -> LogRecordParser {
        LogRecordParser::new(ParserSettings {
            failure_policy: policy,
            ..ParserSettings::default()
        })
    }

    #[test]
    fn parses_the_reference_line() {
        let record = parser(ParseFailurePolicy::FailBatch).parse_line(0, EXAMPLE).unwrap();
        assert_eq!(record.service_name, "scripts-read-db");
        assert_eq!(record.user_name, "alice");
        assert_eq!(record.host, "10.0.0.5");
        assert!((record.reply_time - 0.5).abs() < f64::EPSILON);
        assert_eq!(record.sql_text, "SELECT * FROM users WHERE id = ?");
        assert_eq!(record.table_name, vec!["users".to_string()]);
        assert_eq!(record.date.to_string(), "2024-01-01 10:00:00");
        assert_eq!(record.query_count, 1);
        assert!(record.team_name.is_empty());
        assert!(record.environment_name.is_empty());
    }

    #[test]
    fn identity_before_reply_time_is_the_primary_layout() {
        let line = "svc|x|2024-01-01 10:00:00|bob1:db:schema:10.0.0.7|1.25|SELECT a FROM t";
        let record = parser(ParseFailurePolicy::FailBatch).parse_line(0, line).unwrap();
        assert_eq!(record.user_name, "bob");
        assert_eq!(record.host, "10.0.0.7");
        assert!((record.reply_time - 1.25).abs() < f64::EPSILON);
    }

    #[test]
    fn sql_keeps_embedded_pipes() {
        let line = "svc|x|2024-01-01 10:00:00|u_:d:s:h|0.1|SELECT a FROM t WHERE b = 'x|y'";
        let record = parser(ParseFailurePolicy::FailBatch).parse_line(0, line).unwrap();
        assert_eq!(record.sql_text, "SELECT a FROM t WHERE b = ?");
    }

    #[test]
    fn reports_structural_errors() {
        let parser = parser(ParseFailurePolicy::FailBatch);
        assert_eq!(
            parser.parse_line(3, "a|b|c").unwrap_err(),
            ParseError::MissingFields {
                line: 3,
                found: 3
            }
        );
        assert_eq!(
            parser.parse_line(0, "s|x|2024-01-01 10:00:00|user:db|0.5|SELECT a FROM t").unwrap_err(),
            ParseError::Identity {
                line: 0
            }
        );
        assert!(matches!(
            parser.parse_line(0, "s|x|2024/01/01|u_:d:s:h|0.5|SELECT a FROM t"),
            Err(ParseError::Timestamp { .. })
        ));
        assert!(matches!(
            parser.parse_line(0, "s|x|2024-01-01 10:00:00|u_:d:s:h|fast|SELECT a FROM t"),
            Err(ParseError::ReplyTime { .. })
        ));
    }

    #[test]
    fn fail_batch_stops_at_first_bad_line() {
        let lines = [EXAMPLE, "broken", EXAMPLE];
        let err = parser(ParseFailurePolicy::FailBatch).parse(lines).unwrap_err();
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn skip_record_keeps_good_lines() {
        let lines = [EXAMPLE, "broken", EXAMPLE];
        let report = parser(ParseFailurePolicy::SkipRecord).parse(lines).unwrap();
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line(), 1);
    }

    #[test]
    fn commit_is_filtered() {
        let line = "svc|x|2024-01-01 10:00:00|u_:d:s:10.0.0.1|0.1|commit";
        let report = parser(ParseFailurePolicy::FailBatch).parse([line, EXAMPLE]).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.filtered, 1);
    }

    #[test]
    fn session_statements_are_filtered_after_normalization() {
        assert!(is_denylisted("SET NAMES utf8mb4"));
        assert!(is_denylisted("SELECT ?"));
        assert!(is_denylisted("set @@sql_select_limit=?"));
        assert!(!is_denylisted("SELECT * FROM users WHERE id = ?"));
        assert!(!is_denylisted("Commit"));
        assert_eq!(DENYLIST.len(), 11);
    }
}
