// crates/query-stats-config/src/config.rs
// ============================================================================
// Module: Query Stats Configuration
// Description: Configuration loading and validation for the ingest pipeline.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: query-stats-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file whose path comes from the caller,
//! the `QUERY_STATS_CONFIG` environment variable, or `query-stats.toml` in the
//! working directory. Files are size limited and validated before use; any
//! invalid value fails the load.
//!
//! Sink table and database names are interpolated into SQL statements, so
//! they are restricted to ASCII identifier characters.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use query_stats_core::DEFAULT_SERVICE_NAME;
use query_stats_core::EnrichmentMerge;
use query_stats_core::EnrichmentSettings;
use query_stats_core::ParseFailurePolicy;
use query_stats_core::ParserSettings;
use query_stats_core::PipelineSettings;
use query_stats_core::runtime::DEFAULT_MAX_PAYLOAD_BYTES;
use query_stats_core::runtime::MAX_LOOKUP_CHUNK;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "query-stats.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "QUERY_STATS_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 256 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Upper bound for `pipeline.max_payload_bytes`.
pub const MAX_PAYLOAD_BYTES_LIMIT: usize = 64 * 1024 * 1024;
/// Upper bound for `enrichment.cooldown_ms`.
pub const MAX_COOLDOWN_MS: u64 = 60_000;
/// Upper bound for `sink.max_connections`.
const MAX_SINK_CONNECTIONS: u32 = 32;
/// Upper bound for connect and busy timeouts.
const MAX_TIMEOUT_MS: u64 = 120_000;
/// Maximum length of a SQL identifier.
const MAX_IDENTIFIER_LENGTH: usize = 64;
/// Maximum length of the service name.
const MAX_SERVICE_NAME_LENGTH: usize = 128;
/// Default statistics database.
pub const DEFAULT_DATABASE: &str = "statistics";
/// Default statistics table.
pub const DEFAULT_TABLE: &str = "maxscale_logs_script_read";

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryStatsConfig {
    /// Parsing and payload settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Inventory enrichment settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// AWS client settings.
    #[serde(default)]
    pub aws: AwsConfig,
    /// Statistics sink.
    pub sink: SinkConfig,
    /// Pipeline event log.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QueryStatsConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.enrichment.validate()?;
        self.aws.validate()?;
        self.sink.validate()?;
        self.logging.validate()
    }

    /// Builds runtime pipeline settings.
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_payload_bytes: self.pipeline.max_payload_bytes,
            parser: ParserSettings {
                service_name: self.pipeline.service_name.trim().to_string(),
                failure_policy: self.pipeline.parse_failure,
            },
            enrichment: self.enrichment.settings(),
        }
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Parsing and payload settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Service name stamped on every record.
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// Malformed line handling.
    #[serde(default)]
    pub parse_failure: ParseFailurePolicy,
    /// Cap on the decompressed payload.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            parse_failure: ParseFailurePolicy::default(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl PipelineConfig {
    /// Validates pipeline settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.service_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("pipeline.service_name must be non-empty".to_string()));
        }
        if name.len() > MAX_SERVICE_NAME_LENGTH {
            return Err(ConfigError::Invalid("pipeline.service_name too long".to_string()));
        }
        if self.max_payload_bytes == 0 || self.max_payload_bytes > MAX_PAYLOAD_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "pipeline.max_payload_bytes must be between 1 and {MAX_PAYLOAD_BYTES_LIMIT}"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Enrichment
// ============================================================================

/// Inventory enrichment settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    /// Hosts per lookup call.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between lookup calls in milliseconds.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Chunk result merge policy.
    #[serde(default)]
    pub merge: EnrichmentMerge,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            cooldown_ms: default_cooldown_ms(),
            merge: EnrichmentMerge::default(),
        }
    }
}

impl EnrichmentConfig {
    /// Validates enrichment settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_LOOKUP_CHUNK {
            return Err(ConfigError::Invalid(format!(
                "enrichment.chunk_size must be between 1 and {MAX_LOOKUP_CHUNK}"
            )));
        }
        if self.cooldown_ms > MAX_COOLDOWN_MS {
            return Err(ConfigError::Invalid(format!(
                "enrichment.cooldown_ms must be at most {MAX_COOLDOWN_MS}"
            )));
        }
        Ok(())
    }

    /// Converts to runtime settings.
    #[must_use]
    pub const fn settings(&self) -> EnrichmentSettings {
        EnrichmentSettings {
            chunk_size: self.chunk_size,
            cooldown: Duration::from_millis(self.cooldown_ms),
            merge: self.merge,
        }
    }
}

// ============================================================================
// SECTION: AWS
// ============================================================================

/// AWS client settings shared by the EC2 and Secrets Manager adapters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AwsConfig {
    /// Optional region (defaults to environment).
    #[serde(default)]
    pub region: Option<String>,
    /// Optional endpoint override for both clients.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Allow non-TLS endpoints (explicit opt-in).
    #[serde(default)]
    pub allow_http: bool,
}

impl AwsConfig {
    /// Validates AWS settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(region) = &self.region
            && region.trim().is_empty()
        {
            return Err(ConfigError::Invalid("aws.region must be non-empty".to_string()));
        }
        if let Some(endpoint) = &self.endpoint {
            let trimmed = endpoint.trim();
            if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
                return Err(ConfigError::Invalid(
                    "aws.endpoint must include http:// or https://".to_string(),
                ));
            }
            if trimmed.starts_with("http://") && !self.allow_http {
                return Err(ConfigError::Invalid(
                    "aws.endpoint uses http:// without allow_http".to_string(),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Statistics sink selection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// `MySQL` sink with credentials from Secrets Manager.
    Mysql(MySqlSinkConfig),
    /// Local `SQLite` sink.
    Sqlite(SqliteSinkConfig),
}

impl SinkConfig {
    /// Validates sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Mysql(config) => config.validate(),
            Self::Sqlite(config) => config.validate(),
        }
    }
}

/// `MySQL` sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlSinkConfig {
    /// Database host name.
    pub host: String,
    /// Database port.
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    /// Database (schema) name.
    #[serde(default = "default_database")]
    pub database: String,
    /// Statistics table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Secrets Manager secret holding the credentials.
    pub secret_id: String,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl MySqlSinkConfig {
    /// Validates `MySQL` settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("sink.host must be non-empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("sink.port must be greater than zero".to_string()));
        }
        if self.secret_id.trim().is_empty() {
            return Err(ConfigError::Invalid("sink.secret_id must be non-empty".to_string()));
        }
        validate_identifier("sink.database", &self.database)?;
        validate_identifier("sink.table", &self.table)?;
        validate_timeout("sink.connect_timeout_ms", self.connect_timeout_ms)?;
        if self.max_connections == 0 || self.max_connections > MAX_SINK_CONNECTIONS {
            return Err(ConfigError::Invalid(format!(
                "sink.max_connections must be between 1 and {MAX_SINK_CONNECTIONS}"
            )));
        }
        Ok(())
    }
}

/// `SQLite` sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteSinkConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Statistics table name.
    #[serde(default = "default_table")]
    pub table: String,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl SqliteSinkConfig {
    /// Validates `SQLite` settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("sink.path", &self.path.to_string_lossy())?;
        validate_identifier("sink.table", &self.table)?;
        validate_timeout("sink.busy_timeout_ms", self.busy_timeout_ms)
    }
}

// ============================================================================
// SECTION: Logging
// ============================================================================

/// Pipeline event log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// Append-only JSON lines file.
    File,
    /// Discard events.
    None,
}

/// Pipeline event log settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Destination.
    #[serde(default)]
    pub target: LogTarget,
    /// File path when `target = "file"`.
    #[serde(default)]
    pub path: Option<String>,
}

impl LoggingConfig {
    /// Validates logging settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.target, &self.path) {
            (LogTarget::File, None) => {
                Err(ConfigError::Invalid("logging.path is required for file target".to_string()))
            }
            (LogTarget::File, Some(path)) => validate_path_string("logging.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("logging.path is only valid for file target".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from an explicit value, the environment, or the default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Ensures a name is safe to interpolate into SQL.
fn validate_identifier(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} must be 1..={MAX_IDENTIFIER_LENGTH} characters"
        )));
    }
    if !value.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_') {
        return Err(ConfigError::Invalid(format!("{field} must match [A-Za-z0-9_]+")));
    }
    Ok(())
}

/// Validates a timeout in milliseconds.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and {MAX_TIMEOUT_MS}")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default service name.
fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

/// Default payload cap.
const fn default_max_payload_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_BYTES
}

/// Default chunk size.
const fn default_chunk_size() -> usize {
    MAX_LOOKUP_CHUNK
}

/// Default cooldown.
const fn default_cooldown_ms() -> u64 {
    5_000
}

/// Default `MySQL` port.
const fn default_mysql_port() -> u16 {
    3306
}

/// Default database.
fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

/// Default table.
fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

/// Default connect and busy timeout.
const fn default_timeout_ms() -> u64 {
    5_000
}

/// Default pool size.
const fn default_max_connections() -> u32 {
    1
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test fixtures use unwraps for clarity.")]

    use std::path::Path;

    use super::resolve_path;
    use super::validate_identifier;

    #[test]
    fn explicit_path_wins() {
        let resolved = resolve_path(Some(Path::new("/etc/qs.toml"))).unwrap();
        assert_eq!(resolved, Path::new("/etc/qs.toml"));
    }

    #[test]
    fn identifiers_reject_sql_metacharacters() {
        assert!(validate_identifier("sink.table", "maxscale_logs_script_read").is_ok());
        assert!(validate_identifier("sink.table", "logs`; DROP TABLE x").is_err());
        assert!(validate_identifier("sink.table", "a.b").is_err());
        assert!(validate_identifier("sink.table", "").is_err());
    }
}
