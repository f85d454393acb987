// crates/query-stats-core/src/runtime/pipeline.rs
// ============================================================================
// Module: Ingest Pipeline
// Description: Decode, parse, enrich and persist one subscription event.
// Purpose: Drive a batch through every stage and report a boundary outcome.
// Dependencies: crate::core, crate::interfaces, crate::telemetry, serde, thiserror
// ============================================================================

//! ## Overview
//! [`IngestPipeline`] wires the parser, the enrichment joiner and the injected
//! ports together. [`IngestPipeline::process`] returns typed errors;
//! [`IngestPipeline::handle`] is the invocation boundary and never fails: it
//! logs a `pipeline_failed` event and returns status 500 instead.
//!
//! Control messages are acknowledged without parsing or writing, and an empty
//! batch skips the sink entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::ParsedQueryStat;
use crate::core::QueryStatRow;
use crate::interfaces::Cooldown;
use crate::interfaces::HostLookup;
use crate::interfaces::SinkError;
use crate::interfaces::StatsSink;
use crate::runtime::decode::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::runtime::decode::DecodeError;
use crate::runtime::decode::LogsData;
use crate::runtime::decode::decode_event;
use crate::runtime::enrichment::EnrichmentSettings;
use crate::runtime::enrichment::EnrichmentSummary;
use crate::runtime::enrichment::HostEnrichmentJoiner;
use crate::runtime::parser::LogRecordParser;
use crate::runtime::parser::ParseError;
use crate::runtime::parser::ParserSettings;
use crate::telemetry::PipelineEventKind;
use crate::telemetry::PipelineLog;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors surfaced by [`IngestPipeline::process`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Event could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// A log line could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Rows could not be persisted.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

// ============================================================================
// SECTION: Settings and Ports
// ============================================================================

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Cap on the decompressed payload.
    pub max_payload_bytes: usize,
    /// Parser settings.
    pub parser: ParserSettings,
    /// Enrichment settings.
    pub enrichment: EnrichmentSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            parser: ParserSettings::default(),
            enrichment: EnrichmentSettings::default(),
        }
    }
}

/// External collaborators, created once and reused across invocations.
#[derive(Clone)]
pub struct PipelinePorts {
    /// Inventory lookup.
    pub lookup: Arc<dyn HostLookup>,
    /// Statistics sink.
    pub sink: Arc<dyn StatsSink>,
    /// Cooldown between lookups.
    pub cooldown: Arc<dyn Cooldown>,
    /// Event log.
    pub log: Arc<dyn PipelineLog>,
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Counters for one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// CloudWatch message type.
    pub message_type: String,
    /// Log events in the batch.
    pub events: usize,
    /// Records kept after parsing and filtering.
    pub records: usize,
    /// Lines skipped as malformed.
    pub rejected: usize,
    /// Records dropped by the denylist.
    pub filtered: usize,
    /// Enrichment counters.
    pub enrichment: EnrichmentSummary,
    /// Rows accepted by the sink.
    pub rows_written: usize,
}

/// Boundary response for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationOutcome {
    /// 200 on success, 500 on failure.
    pub status_code: u16,
    /// Human-readable result.
    pub body: String,
}

impl InvocationOutcome {
    /// Successful outcome naming the rows written.
    #[must_use]
    pub fn success(report: &IngestReport) -> Self {
        Self {
            status_code: 200,
            body: format!("{} rows written", report.rows_written),
        }
    }

    /// Failed outcome.
    #[must_use]
    pub fn failure() -> Self {
        Self {
            status_code: 500,
            body: "failed".to_string(),
        }
    }

    /// Returns true for a 200 outcome.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// End-to-end ingestion driver.
pub struct IngestPipeline {
    /// Decompressed payload cap.
    max_payload_bytes: usize,
    /// Line parser.
    parser: LogRecordParser,
    /// Enrichment joiner.
    joiner: HostEnrichmentJoiner,
    /// Injected collaborators.
    ports: PipelinePorts,
}

impl IngestPipeline {
    /// Builds a pipeline with the default metadata extractor.
    #[must_use]
    pub fn new(settings: PipelineSettings, ports: PipelinePorts) -> Self {
        Self::with_parser(
            settings.max_payload_bytes,
            LogRecordParser::new(settings.parser),
            settings.enrichment,
            ports,
        )
    }

    /// Builds a pipeline around a preconfigured parser.
    #[must_use]
    pub fn with_parser(
        max_payload_bytes: usize,
        parser: LogRecordParser,
        enrichment: EnrichmentSettings,
        ports: PipelinePorts,
    ) -> Self {
        let joiner = HostEnrichmentJoiner::new(enrichment, Arc::clone(&ports.cooldown));
        Self {
            max_payload_bytes,
            parser,
            joiner,
            ports,
        }
    }

    /// Handles one raw event; never fails.
    #[must_use]
    pub fn handle(&self, event: &[u8]) -> InvocationOutcome {
        match self.process(event) {
            Ok(report) => InvocationOutcome::success(&report),
            Err(err) => {
                self.ports.log.emit(PipelineEventKind::PipelineFailed {
                    error: err.to_string(),
                });
                InvocationOutcome::failure()
            }
        }
    }

    /// Decodes and processes one raw event.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when decoding, parsing or persistence fails.
    pub fn process(&self, event: &[u8]) -> Result<IngestReport, PipelineError> {
        let logs = decode_event(event, self.max_payload_bytes)?;
        self.process_logs(&logs)
    }

    /// Processes an already decoded batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when parsing or persistence fails.
    pub fn process_logs(&self, logs: &LogsData) -> Result<IngestReport, PipelineError> {
        let log = self.ports.log.as_ref();
        log.emit(PipelineEventKind::BatchDecoded {
            message_type: logs.message_type.clone(),
            log_group: logs.log_group.clone(),
            log_stream: logs.log_stream.clone(),
            events: logs.log_events.len(),
        });
        let mut report = IngestReport {
            message_type: logs.message_type.clone(),
            events: logs.log_events.len(),
            ..IngestReport::default()
        };
        if logs.is_control_message() {
            log.emit(PipelineEventKind::ControlMessageSkipped {
                log_group: logs.log_group.clone(),
            });
            return Ok(report);
        }

        let parsed = self.parser.parse(logs.messages())?;
        for rejected in &parsed.rejected {
            log.emit(PipelineEventKind::RecordRejected {
                line: rejected.line(),
                reason: rejected.to_string(),
            });
        }
        log.emit(PipelineEventKind::RecordsFiltered {
            kept: parsed.records.len(),
            filtered: parsed.filtered,
        });
        report.rejected = parsed.rejected.len();
        report.filtered = parsed.filtered;

        let mut records = parsed.records;
        report.records = records.len();
        if records.is_empty() {
            return Ok(report);
        }
        report.enrichment = self.joiner.enrich(&mut records, self.ports.lookup.as_ref(), log);

        let rows: Vec<QueryStatRow> = records.iter().map(ParsedQueryStat::to_row).collect();
        report.rows_written = self.ports.sink.write(&rows)?;
        log.emit(PipelineEventKind::RowsWritten {
            rows: report.rows_written,
        });
        Ok(report)
    }
}
