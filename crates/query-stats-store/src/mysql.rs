// crates/query-stats-store/src/mysql.rs
// ============================================================================
// Module: MySQL Statistics Sink
// Description: Insert-or-increment sink for the MySQL statistics table.
// Purpose: Persist statistics rows with credentials from a secrets port.
// Dependencies: query-stats-config, query-stats-core, sqlx
// ============================================================================

//! ## Overview
//! Credentials are resolved through [`SecretsSource`] on the first write and
//! the resulting pool is reused for later batches. Every batch runs in one
//! transaction using `ON DUPLICATE KEY UPDATE query_count = query_count + 1`,
//! so replaying a row counts it again rather than failing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use query_stats_config::MySqlSinkConfig;
use query_stats_core::BlockingRuntime;
use query_stats_core::DatabaseCredentials;
use query_stats_core::QueryStatRow;
use query_stats_core::SecretsSource;
use query_stats_core::SinkError;
use query_stats_core::StatsSink;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::mysql::MySqlPoolOptions;

use crate::KEY_COLUMNS;

// ============================================================================
// SECTION: Sink
// ============================================================================

/// `MySQL`-backed [`StatsSink`].
pub struct MySqlStatsSink {
    /// Connection settings.
    config: MySqlSinkConfig,
    /// Credential source.
    secrets: Arc<dyn SecretsSource>,
    /// Runtime driving sqlx futures.
    runtime: Arc<BlockingRuntime>,
    /// Pool created on first use.
    pool: Mutex<Option<MySqlPool>>,
    /// Prepared insert statement text.
    statement: String,
}

impl MySqlStatsSink {
    /// Builds a sink; no connection is made until the first write.
    #[must_use]
    pub fn new(
        config: MySqlSinkConfig,
        secrets: Arc<dyn SecretsSource>,
        runtime: Arc<BlockingRuntime>,
    ) -> Self {
        let statement = insert_statement(&config.database, &config.table);
        Self {
            config,
            secrets,
            runtime,
            pool: Mutex::new(None),
            statement,
        }
    }

    /// Returns the cached pool, connecting on first use.
    fn pool(&self) -> Result<MySqlPool, SinkError> {
        let mut guard =
            self.pool.lock().map_err(|_| SinkError::Connection("mutex poisoned".to_string()))?;
        if let Some(pool) = guard.as_ref() {
            return Ok(pool.clone());
        }
        let credentials = self
            .secrets
            .credentials(&self.config.secret_id)
            .map_err(|err| SinkError::Credentials(err.to_string()))?;
        let options = connect_options(&self.config, &credentials);
        let pool_options = MySqlPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(Duration::from_millis(self.config.connect_timeout_ms));
        let pool = self.runtime.block_on(
            async move {
                pool_options
                    .connect_with(options)
                    .await
                    .map_err(|err| SinkError::Connection(err.to_string()))
            },
            SinkError::Connection,
        )?;
        *guard = Some(pool.clone());
        Ok(pool)
    }
}

impl StatsSink for MySqlStatsSink {
    fn write(&self, rows: &[QueryStatRow]) -> Result<usize, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let pool = self.pool()?;
        let statement = self.statement.clone();
        let rows = rows.to_vec();
        self.runtime.block_on(
            async move {
                let mut tx =
                    pool.begin().await.map_err(|err| SinkError::Connection(err.to_string()))?;
                for row in &rows {
                    sqlx::query(&statement)
                        .bind(&row.service_name)
                        .bind(&row.user_name)
                        .bind(&row.host)
                        .bind(&row.sql_text)
                        .bind(&row.table_name)
                        .bind(row.date.as_primitive())
                        .bind(&row.team_name)
                        .bind(&row.environment_name)
                        .bind(row.query_count)
                        .execute(&mut *tx)
                        .await
                        .map_err(|err| SinkError::Write(err.to_string()))?;
                }
                tx.commit().await.map_err(|err| SinkError::Write(err.to_string()))?;
                Ok(rows.len())
            },
            SinkError::Connection,
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Connection options for the configured server.
fn connect_options(config: &MySqlSinkConfig, credentials: &DatabaseCredentials) -> MySqlConnectOptions {
    MySqlConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&credentials.username)
        .password(&credentials.password)
        .database(&config.database)
}

/// Insert-or-increment statement for `database.table`.
#[must_use]
pub fn insert_statement(database: &str, table: &str) -> String {
    let columns: Vec<String> = KEY_COLUMNS.iter().map(|column| format!("`{column}`")).collect();
    format!(
        "INSERT INTO {database}.{table} ({}, `query_count`) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE query_count = query_count + 1",
        columns.join(",")
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
