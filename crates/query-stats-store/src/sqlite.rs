// crates/query-stats-store/src/sqlite.rs
// ============================================================================
// Module: SQLite Statistics Sink
// Description: Local insert-or-increment sink backed by SQLite.
// Purpose: Persist statistics rows without a MySQL server.
// Dependencies: query-stats-config, query-stats-core, rusqlite
// ============================================================================

//! ## Overview
//! The sink creates its table on open with a unique key over the eight
//! natural-key columns. Each batch is one transaction; a repeated row bumps
//! `query_count` instead of inserting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use query_stats_config::SqliteSinkConfig;
use query_stats_core::LogTimestamp;
use query_stats_core::QueryStatRow;
use query_stats_core::SinkError;
use query_stats_core::StatsSink;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params;

use crate::KEY_COLUMNS;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// `SQLite`-backed [`StatsSink`].
pub struct SqliteStatsSink {
    /// Shared connection guarded by a mutex.
    connection: Mutex<Connection>,
    /// Table name, validated as an identifier by the config layer.
    table: String,
}

impl SqliteStatsSink {
    /// Opens (and creates when needed) the statistics database.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the database cannot be opened or initialized.
    pub fn open(config: &SqliteSinkConfig) -> Result<Self, SinkError> {
        ensure_parent_dir(&config.path)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let connection = Connection::open_with_flags(&config.path, flags)
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        connection
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        connection
            .execute_batch(&create_table_statement(&config.table))
            .map_err(|err| SinkError::Connection(err.to_string()))?;
        Ok(Self {
            connection: Mutex::new(connection),
            table: config.table.clone(),
        })
    }

    /// Reads every stored row ordered by insertion.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the query fails or a stored date is invalid.
    pub fn rows(&self) -> Result<Vec<QueryStatRow>, SinkError> {
        let guard =
            self.connection.lock().map_err(|_| SinkError::Write("mutex poisoned".to_string()))?;
        let sql = format!(
            "SELECT {}, query_count FROM {} ORDER BY rowid",
            KEY_COLUMNS.join(", "),
            self.table
        );
        let mut statement = guard.prepare(&sql).map_err(|err| SinkError::Write(err.to_string()))?;
        let raw = statement
            .query_map(params![], |row| {
                Ok((
                    [
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ],
                    row.get::<_, u32>(8)?,
                ))
            })
            .map_err(|err| SinkError::Write(err.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| SinkError::Write(err.to_string()))?;
        raw.into_iter()
            .map(|(columns, query_count)| {
                let [service_name, user_name, host, sql_text, table_name, date, team_name, environment_name] =
                    columns;
                let date = LogTimestamp::parse(&date).map_err(|err| SinkError::Invalid(err.to_string()))?;
                Ok(QueryStatRow {
                    service_name,
                    user_name,
                    host,
                    sql_text,
                    table_name,
                    date,
                    team_name,
                    environment_name,
                    query_count,
                })
            })
            .collect()
    }
}

impl StatsSink for SqliteStatsSink {
    fn write(&self, rows: &[QueryStatRow]) -> Result<usize, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut guard =
            self.connection.lock().map_err(|_| SinkError::Write("mutex poisoned".to_string()))?;
        let tx = guard.transaction().map_err(|err| SinkError::Write(err.to_string()))?;
        {
            let mut statement = tx
                .prepare(&upsert_statement(&self.table))
                .map_err(|err| SinkError::Write(err.to_string()))?;
            for row in rows {
                statement
                    .execute(params![
                        row.service_name,
                        row.user_name,
                        row.host,
                        row.sql_text,
                        row.table_name,
                        row.date.to_string(),
                        row.team_name,
                        row.environment_name,
                        row.query_count,
                    ])
                    .map_err(|err| SinkError::Write(err.to_string()))?;
            }
        }
        tx.commit().map_err(|err| SinkError::Write(err.to_string()))?;
        Ok(rows.len())
    }
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Table definition with the natural-key constraint.
fn create_table_statement(table: &str) -> String {
    let columns: Vec<String> = KEY_COLUMNS.iter().map(|column| format!("{column} TEXT NOT NULL")).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({}, query_count INTEGER NOT NULL DEFAULT 1, UNIQUE ({}));",
        columns.join(", "),
        KEY_COLUMNS.join(", ")
    )
}

/// Insert-or-increment statement.
fn upsert_statement(table: &str) -> String {
    let keys = KEY_COLUMNS.join(", ");
    format!(
        "INSERT INTO {table} ({keys}, query_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
         ON CONFLICT ({keys}) DO UPDATE SET query_count = query_count + 1"
    )
}

/// Creates the parent directory of the database file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SinkError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| SinkError::Connection(err.to_string()))?;
    }
    Ok(())
}
