// crates/query-stats-core/src/runtime/decode.rs
// ============================================================================
// Module: Event Decoding
// Description: CloudWatch Logs subscription event envelope decoding.
// Purpose: Turn `{"awslogs":{"data":...}}` into typed log events.
// Dependencies: base64, flate2, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A subscription event wraps a base64 string holding a gzip stream of the
//! [`LogsData`] JSON document. Decompression is capped so a hostile or
//! corrupt payload cannot exhaust memory. Concatenated gzip members are read
//! as one stream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default cap on the decompressed payload size.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Message type of subscription health checks.
pub const CONTROL_MESSAGE: &str = "CONTROL_MESSAGE";

/// Message type of batches carrying log events.
pub const DATA_MESSAGE: &str = "DATA_MESSAGE";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Raw subscription event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    /// Wrapped payload.
    pub awslogs: AwsLogsPayload,
}

/// Encoded payload within a subscription event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsLogsPayload {
    /// Base64 gzip JSON.
    pub data: String,
}

/// Decoded subscription payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsData {
    /// `DATA_MESSAGE` or `CONTROL_MESSAGE`.
    pub message_type: String,
    /// Owning account.
    #[serde(default)]
    pub owner: String,
    /// Source log group.
    #[serde(default)]
    pub log_group: String,
    /// Source log stream.
    #[serde(default)]
    pub log_stream: String,
    /// Subscription filter names.
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    /// Log events in the batch.
    #[serde(default)]
    pub log_events: Vec<LogEvent>,
}

impl LogsData {
    /// Returns true for subscription control messages.
    #[must_use]
    pub fn is_control_message(&self) -> bool {
        self.message_type == CONTROL_MESSAGE
    }

    /// Returns the raw message of each log event.
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.log_events.iter().map(|event| event.message.as_str())
    }
}

/// Single CloudWatch log event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Event identifier.
    #[serde(default)]
    pub id: String,
    /// Ingestion timestamp (milliseconds since epoch).
    #[serde(default)]
    pub timestamp: i64,
    /// Raw log line.
    pub message: String,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Event decoding errors; all are fatal for the invocation.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Outer event JSON is malformed.
    #[error("event envelope invalid: {0}")]
    Envelope(String),
    /// Payload is not valid base64.
    #[error("payload base64 invalid: {0}")]
    Base64(String),
    /// Payload is not a valid gzip stream.
    #[error("payload gzip invalid: {0}")]
    Gzip(String),
    /// Decompressed payload exceeds the configured limit.
    #[error("payload exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit.
        limit: usize,
    },
    /// Decompressed payload is not a logs document.
    #[error("payload json invalid: {0}")]
    Json(String),
    /// Payload carries a message type other than data or control.
    #[error("unsupported message type: {0}")]
    MessageType(String),
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes a raw subscription event.
///
/// # Errors
///
/// Returns [`DecodeError`] when any decoding layer fails or the limit is hit.
pub fn decode_event(event: &[u8], max_payload_bytes: usize) -> Result<LogsData, DecodeError> {
    let envelope: SubscriptionEvent =
        serde_json::from_slice(event).map_err(|err| DecodeError::Envelope(err.to_string()))?;
    decode_payload(&envelope.awslogs.data, max_payload_bytes)
}

/// Decodes the base64 gzip payload of a subscription event.
///
/// # Errors
///
/// Returns [`DecodeError`] when any decoding layer fails or the limit is hit.
pub fn decode_payload(data: &str, max_payload_bytes: usize) -> Result<LogsData, DecodeError> {
    let compressed =
        STANDARD.decode(data.trim()).map_err(|err| DecodeError::Base64(err.to_string()))?;
    let limit = u64::try_from(max_payload_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let mut decompressed = Vec::new();
    MultiGzDecoder::new(compressed.as_slice())
        .take(limit)
        .read_to_end(&mut decompressed)
        .map_err(|err| DecodeError::Gzip(err.to_string()))?;
    if decompressed.len() > max_payload_bytes {
        return Err(DecodeError::TooLarge {
            limit: max_payload_bytes,
        });
    }
    let logs: LogsData =
        serde_json::from_slice(&decompressed).map_err(|err| DecodeError::Json(err.to_string()))?;
    match logs.message_type.as_str() {
        DATA_MESSAGE | CONTROL_MESSAGE => Ok(logs),
        other => Err(DecodeError::MessageType(other.to_string())),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
