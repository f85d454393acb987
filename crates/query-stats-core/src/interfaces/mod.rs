// crates/query-stats-core/src/interfaces/mod.rs
// ============================================================================
// Module: Query Stats Interfaces
// Description: Backend-agnostic ports for inventory, secrets and persistence.
// Purpose: Define the contract surfaces the pipeline depends on.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces describe how the pipeline reaches external systems without
//! embedding AWS or database details. Adapter crates implement these traits;
//! tests use in-memory fakes. All ports are `Send + Sync` so a runner can
//! create them once and reuse them across invocations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::core::EnrichmentRecord;
use crate::core::QueryStatRow;

// ============================================================================
// SECTION: Host Lookup
// ============================================================================

/// Inventory lookup errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Lookup request was rejected before reaching the backend.
    #[error("host lookup invalid request: {0}")]
    Invalid(String),
    /// Backend reported an error.
    #[error("host lookup backend error: {0}")]
    Backend(String),
}

/// Resolves host IPs to ownership metadata.
pub trait HostLookup: Send + Sync {
    /// Resolves one chunk of private IPs.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the inventory cannot be queried.
    fn resolve(&self, hosts: &[String]) -> Result<Vec<EnrichmentRecord>, LookupError>;
}

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// Credential lookup errors.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// Secret does not exist or has no string value.
    #[error("secret not found: {0}")]
    Missing(String),
    /// Secret value is not the expected JSON document.
    #[error("secret invalid: {0}")]
    Invalid(String),
    /// Backend reported an error.
    #[error("secret backend error: {0}")]
    Backend(String),
}

/// Database credentials stored as a JSON secret.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseCredentials {
    /// Database user name.
    #[serde(alias = "database_username")]
    pub username: String,
    /// Database password.
    #[serde(alias = "database_password")]
    pub password: String,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fetches database credentials by secret identifier.
pub trait SecretsSource: Send + Sync {
    /// Returns the credentials stored under `secret_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError`] when the secret is missing or malformed.
    fn credentials(&self, secret_id: &str) -> Result<DatabaseCredentials, SecretsError>;
}

// ============================================================================
// SECTION: Stats Sink
// ============================================================================

/// Persistence errors.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Connection could not be established.
    #[error("stats sink connection error: {0}")]
    Connection(String),
    /// Credentials could not be resolved.
    #[error("stats sink credentials error: {0}")]
    Credentials(String),
    /// Statement execution failed.
    #[error("stats sink write error: {0}")]
    Write(String),
    /// Sink configuration is invalid.
    #[error("stats sink invalid: {0}")]
    Invalid(String),
}

/// Insert-or-increment persistence for query statistics.
pub trait StatsSink: Send + Sync {
    /// Writes rows in one transaction; a repeated natural key increments
    /// `query_count` instead of inserting.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the batch cannot be committed.
    fn write(&self, rows: &[QueryStatRow]) -> Result<usize, SinkError>;
}

/// Sink that keeps rows in memory, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryStatsSink {
    /// Accepted rows in write order.
    rows: Mutex<Vec<QueryStatRow>>,
}

impl InMemoryStatsSink {
    /// Returns a copy of the accepted rows.
    #[must_use]
    pub fn rows(&self) -> Vec<QueryStatRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

impl StatsSink for InMemoryStatsSink {
    fn write(&self, rows: &[QueryStatRow]) -> Result<usize, SinkError> {
        let mut guard =
            self.rows.lock().map_err(|_| SinkError::Write("in-memory sink poisoned".to_string()))?;
        guard.extend_from_slice(rows);
        Ok(rows.len())
    }
}

// ============================================================================
// SECTION: Cooldown
// ============================================================================

/// Pause between successive inventory lookups.
pub trait Cooldown: Send + Sync {
    /// Blocks the caller for `duration`.
    fn pause(&self, duration: Duration);
}

/// Cooldown backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCooldown;

impl Cooldown for ThreadCooldown {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
