// crates/query-stats-core/src/telemetry.rs
// ============================================================================
// Module: Pipeline Logging
// Description: Structured pipeline events and JSON-line log sinks.
// Purpose: Emit machine-readable progress and failure events without SQL text.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every pipeline stage reports through a [`PipelineLog`]. Events are plain
//! serde structs rendered as one JSON object per line, so deployments can route
//! them to whatever log collector reads stderr or a file. Event payloads carry
//! counts, identifiers and error messages only; SQL text never appears.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::runtime::EnrichmentMerge;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Event-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEventKind {
    /// Event envelope decoded.
    BatchDecoded {
        /// CloudWatch message type.
        message_type: String,
        /// Source log group.
        log_group: String,
        /// Source log stream.
        log_stream: String,
        /// Log events in the batch.
        events: usize,
    },
    /// Subscription control message acknowledged without processing.
    ControlMessageSkipped {
        /// Source log group.
        log_group: String,
    },
    /// Malformed line skipped.
    RecordRejected {
        /// Zero-based line index.
        line: usize,
        /// Parse error message.
        reason: String,
    },
    /// Denylist applied.
    RecordsFiltered {
        /// Records kept.
        kept: usize,
        /// Records dropped.
        filtered: usize,
    },
    /// One lookup chunk resolved.
    ChunkResolved {
        /// Chunk index.
        chunk: usize,
        /// Hosts in the chunk.
        hosts: usize,
        /// Inventory records returned.
        instances: usize,
    },
    /// One lookup chunk failed.
    LookupFailed {
        /// Chunk index.
        chunk: usize,
        /// Hosts in the chunk.
        hosts: usize,
        /// Lookup error message.
        error: String,
    },
    /// Enrichment finished.
    RecordsEnriched {
        /// Records considered.
        records: usize,
        /// Records matched.
        matched: usize,
        /// Lookup calls made.
        chunks: usize,
        /// Lookup calls failed.
        failed_chunks: usize,
        /// Merge policy in effect.
        merge: EnrichmentMerge,
    },
    /// Rows handed to the sink.
    RowsWritten {
        /// Rows written.
        rows: usize,
    },
    /// Invocation failed at the boundary.
    PipelineFailed {
        /// Failure message.
        error: String,
    },
}

impl PipelineEventKind {
    /// Returns the serialized event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::BatchDecoded {
                ..
            } => "batch_decoded",
            Self::ControlMessageSkipped {
                ..
            } => "control_message_skipped",
            Self::RecordRejected {
                ..
            } => "record_rejected",
            Self::RecordsFiltered {
                ..
            } => "records_filtered",
            Self::ChunkResolved {
                ..
            } => "chunk_resolved",
            Self::LookupFailed {
                ..
            } => "lookup_failed",
            Self::RecordsEnriched {
                ..
            } => "records_enriched",
            Self::RowsWritten {
                ..
            } => "rows_written",
            Self::PipelineFailed {
                ..
            } => "pipeline_failed",
        }
    }
}

/// Pipeline event with a capture timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineEvent {
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event payload, flattened next to the timestamp.
    #[serde(flatten)]
    pub kind: PipelineEventKind,
}

impl PipelineEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(kind: PipelineEventKind) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            timestamp_ms,
            kind,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Receiver for pipeline events.
pub trait PipelineLog: Send + Sync {
    /// Records an event.
    fn record(&self, event: &PipelineEvent);

    /// Stamps and records an event payload.
    fn emit(&self, kind: PipelineEventKind) {
        self.record(&PipelineEvent::new(kind));
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Log that writes JSON lines to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrPipelineLog;

impl PipelineLog for StderrPipelineLog {
    fn record(&self, event: &PipelineEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Log that appends JSON lines to a file.
pub struct FilePipelineLog {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FilePipelineLog {
    /// Opens the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl PipelineLog for FilePipelineLog {
    fn record(&self, event: &PipelineEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Log that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPipelineLog;

impl PipelineLog for NoopPipelineLog {
    fn record(&self, _event: &PipelineEvent) {}
}

/// Log that keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryPipelineLog {
    /// Recorded events in arrival order.
    events: Mutex<Vec<PipelineEvent>>,
}

impl MemoryPipelineLog {
    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded event names in arrival order.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(|event| event.kind.name()).collect()
    }
}

impl PipelineLog for MemoryPipelineLog {
    fn record(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test fixtures use unwraps for clarity.")]

    use std::fs;

    use super::FilePipelineLog;
    use super::PipelineEvent;
    use super::PipelineEventKind;
    use super::PipelineLog;

    #[test]
    fn event_serializes_flat_with_name() {
        let event = PipelineEvent::new(PipelineEventKind::RowsWritten {
            rows: 3,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "rows_written");
        assert_eq!(value["rows"], 3);
        assert!(value["timestamp_ms"].is_u64());
    }

    #[test]
    fn file_log_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.log");
        let log = FilePipelineLog::new(&path).unwrap();
        log.emit(PipelineEventKind::RowsWritten {
            rows: 1,
        });
        log.emit(PipelineEventKind::PipelineFailed {
            error: "sink down".to_string(),
        });
        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let last: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(last["event"], "pipeline_failed");
    }
}
