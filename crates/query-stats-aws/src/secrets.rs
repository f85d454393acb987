// crates/query-stats-aws/src/secrets.rs
// ============================================================================
// Module: Secrets Manager Source
// Description: Reads database credentials from a JSON secret.
// Purpose: Implement the secrets port against AWS Secrets Manager.
// Dependencies: aws-sdk-secretsmanager, query-stats-core, serde_json
// ============================================================================

//! ## Overview
//! The secret string is a JSON object with `username`/`password` (or the
//! legacy `database_username`/`database_password`) keys.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use aws_sdk_secretsmanager::Client;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use query_stats_core::BlockingRuntime;
use query_stats_core::DatabaseCredentials;
use query_stats_core::SecretsError;
use query_stats_core::SecretsSource;

use crate::context::AwsContext;

// ============================================================================
// SECTION: Source
// ============================================================================

/// Secrets Manager backed [`SecretsSource`].
pub struct SecretsManagerSource {
    /// Secrets Manager client.
    client: Client,
    /// Runtime driving SDK futures.
    runtime: Arc<BlockingRuntime>,
}

impl SecretsManagerSource {
    /// Builds the source from a loaded context.
    #[must_use]
    pub fn new(context: &AwsContext) -> Self {
        Self {
            client: Client::new(context.sdk_config()),
            runtime: context.runtime(),
        }
    }
}

impl SecretsSource for SecretsManagerSource {
    fn credentials(&self, secret_id: &str) -> Result<DatabaseCredentials, SecretsError> {
        let client = self.client.clone();
        let secret_id = secret_id.to_string();
        let secret = self.runtime.block_on(
            async move {
                let output = client
                    .get_secret_value()
                    .secret_id(secret_id.clone())
                    .send()
                    .await
                    .map_err(|err| SecretsError::Backend(DisplayErrorContext(&err).to_string()))?;
                output.secret_string().map(str::to_string).ok_or(SecretsError::Missing(secret_id))
            },
            SecretsError::Backend,
        )?;
        parse_credentials(&secret)
    }
}

/// Parses a JSON secret string into credentials.
///
/// # Errors
///
/// Returns [`SecretsError::Invalid`] when the document is not a credentials object.
pub fn parse_credentials(secret: &str) -> Result<DatabaseCredentials, SecretsError> {
    let credentials: DatabaseCredentials =
        serde_json::from_str(secret).map_err(|err| {
            SecretsError::Invalid(format!(
                "not a credentials document (line {}, column {})",
                err.line(),
                err.column()
            ))
        })?;
    if credentials.username.is_empty() {
        return Err(SecretsError::Invalid("username must be non-empty".to_string()));
    }
    Ok(credentials)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test fixtures use unwraps for clarity.")]

    use query_stats_core::SecretsError;

    use super::parse_credentials;

    #[test]
    fn accepts_legacy_key_names() {
        let credentials =
            parse_credentials(r#"{"database_username":"stats","database_password":"pw"}"#).unwrap();
        assert_eq!(credentials.username, "stats");
        assert_eq!(credentials.password, "pw");
    }

    #[test]
    fn accepts_plain_key_names() {
        let credentials = parse_credentials(r#"{"username":"stats","password":"pw","engine":"mysql"}"#).unwrap();
        assert_eq!(credentials.username, "stats");
    }

    #[test]
    fn rejects_non_credential_documents() {
        assert!(matches!(parse_credentials("not json"), Err(SecretsError::Invalid(_))));
        assert!(matches!(parse_credentials(r#"{"username":"stats"}"#), Err(SecretsError::Invalid(_))));
        assert!(matches!(
            parse_credentials(r#"{"username":"","password":"pw"}"#),
            Err(SecretsError::Invalid(_))
        ));
    }

    #[test]
    fn invalid_documents_do_not_echo_values() {
        let err = parse_credentials(r#"{"username":"stats","password":["hunter2"]}"#).unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }
}
