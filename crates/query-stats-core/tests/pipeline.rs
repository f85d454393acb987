//! Ingest pipeline integration tests.
//!
//! ## Purpose
//! Drive encoded subscription events through decode, parse, enrich and sink
//! with in-memory ports.
//!
//! ## What is covered
//! - Reference line end to end, including enrichment and row shape.
//! - Control messages, denylisted batches and failure boundaries.
//! - Parse failure policies and enrichment merge policies.
// crates/query-stats-core/tests/pipeline.rs
// ============================================================================
// Module: Ingest Pipeline Tests
// Description: End-to-end pipeline behavior against in-memory ports.
// Purpose: Validate stage wiring and boundary outcomes.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::time::Duration;

use query_stats_core::EnrichmentMerge;
use query_stats_core::EnrichmentSettings;
use query_stats_core::IngestPipeline;
use query_stats_core::ParseFailurePolicy;
use query_stats_core::ParserSettings;
use query_stats_core::PipelineError;
use query_stats_core::PipelinePorts;
use query_stats_core::PipelineSettings;
use query_stats_core::telemetry::PipelineEventKind;

mod common;
use crate::common::FailingSink;
use crate::common::Harness;
use crate::common::REFERENCE_LINE;
use crate::common::StaticLookup;
use crate::common::encode_event;
use crate::common::enrichment;
use crate::common::line;

fn pipeline(harness: &Harness, settings: PipelineSettings) -> IngestPipeline {
    IngestPipeline::new(settings, harness.ports())
}

#[test]
fn reference_line_is_enriched_and_written() {
    let harness = Harness::new(StaticLookup::with(vec![enrichment("10.0.0.5", "core", "prod")]));
    let second = line("bob", "10.0.0.9", "SELECT name FROM teams");
    let event = encode_event("DATA_MESSAGE", &[REFERENCE_LINE, &second]);

    let outcome = pipeline(&harness, PipelineSettings::default()).handle(&event);

    assert_eq!(outcome.status_code, 200);
    assert_eq!(outcome.body, "2 rows written");
    let rows = harness.sink.rows();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].service_name, "scripts-read-db");
    assert_eq!(rows[0].user_name, "alice");
    assert_eq!(rows[0].host, "10.0.0.5");
    assert_eq!(rows[0].sql_text, "SELECT * FROM users WHERE id = ?");
    assert_eq!(rows[0].table_name, "users");
    assert_eq!(rows[0].date.to_string(), "2024-01-01 10:00:00");
    assert_eq!(rows[0].team_name, "core");
    assert_eq!(rows[0].environment_name, "prod");
    assert_eq!(rows[0].query_count, 1);
    assert_eq!(rows[1].table_name, "teams");
    assert!(rows[1].team_name.is_empty());
    assert!(rows[1].environment_name.is_empty());
}

#[test]
fn configured_service_name_is_stamped() {
    let harness = Harness::new(StaticLookup::default());
    let settings = PipelineSettings {
        parser: ParserSettings {
            service_name: "billing-read-db".to_string(),
            failure_policy: ParseFailurePolicy::FailBatch,
        },
        ..PipelineSettings::default()
    };
    let event = encode_event("DATA_MESSAGE", &[REFERENCE_LINE]);

    pipeline(&harness, settings).process(&event).unwrap();

    assert_eq!(harness.sink.rows()[0].service_name, "billing-read-db");
}

#[test]
fn control_message_is_acknowledged_without_writes() {
    let harness = Harness::new(StaticLookup::default());
    let event = encode_event("CONTROL_MESSAGE", &["CWL CONTROL MESSAGE: Checking health of destination"]);

    let report = pipeline(&harness, PipelineSettings::default()).process(&event).unwrap();

    assert_eq!(report.rows_written, 0);
    assert!(harness.sink.rows().is_empty());
    assert!(harness.lookup.calls.lock().unwrap().is_empty());
    assert!(harness.log.event_names().contains(&"control_message_skipped"));
}

#[test]
fn fully_filtered_batch_skips_lookup_and_sink() {
    let harness = Harness::new(StaticLookup::default());
    let commit = line("alice", "10.0.0.5", "commit");
    let set = line("alice", "10.0.0.5", "SET autocommit=1");
    let event = encode_event("DATA_MESSAGE", &[&commit, &set]);

    let report = pipeline(&harness, PipelineSettings::default()).process(&event).unwrap();

    assert_eq!(report.filtered, 2);
    assert_eq!(report.records, 0);
    assert!(harness.lookup.calls.lock().unwrap().is_empty());
    assert!(harness.sink.rows().is_empty());
}

#[test]
fn malformed_line_fails_batch_by_default() {
    let harness = Harness::new(StaticLookup::default());
    let event = encode_event("DATA_MESSAGE", &[REFERENCE_LINE, "not|a|log|line"]);
    let pipeline = pipeline(&harness, PipelineSettings::default());

    assert!(matches!(pipeline.process(&event), Err(PipelineError::Parse(_))));
    let outcome = pipeline.handle(&event);
    assert_eq!(outcome.status_code, 500);
    assert!(harness.sink.rows().is_empty());
    assert!(harness.log.event_names().contains(&"pipeline_failed"));
}

#[test]
fn skip_record_policy_writes_remaining_lines() {
    let harness = Harness::new(StaticLookup::default());
    let settings = PipelineSettings {
        parser: ParserSettings {
            failure_policy: ParseFailurePolicy::SkipRecord,
            ..ParserSettings::default()
        },
        ..PipelineSettings::default()
    };
    let event = encode_event("DATA_MESSAGE", &[REFERENCE_LINE, "not|a|log|line"]);

    let report = pipeline(&harness, settings).process(&event).unwrap();

    assert_eq!(report.rejected, 1);
    assert_eq!(report.rows_written, 1);
    let rejected: Vec<_> = harness
        .log
        .events()
        .into_iter()
        .filter_map(|event| match event.kind {
            PipelineEventKind::RecordRejected {
                line, ..
            } => Some(line),
            _ => None,
        })
        .collect();
    assert_eq!(rejected, vec![1]);
}

#[test]
fn undecodable_event_returns_failure_outcome() {
    let harness = Harness::new(StaticLookup::default());
    let outcome = pipeline(&harness, PipelineSettings::default()).handle(b"{\"awslogs\":{\"data\":\"???\"}}");
    assert_eq!(outcome.status_code, 500);
    assert_eq!(outcome.body, "failed");
}

#[test]
fn unknown_message_type_fails_without_lookup_or_writes() {
    let harness = Harness::new(StaticLookup::default());
    let event = encode_event("SUBSCRIPTION_TEST", &[REFERENCE_LINE]);

    let result = pipeline(&harness, PipelineSettings::default()).process(&event);
    assert!(matches!(result, Err(PipelineError::Decode(_))));

    let outcome = pipeline(&harness, PipelineSettings::default()).handle(&event);
    assert_eq!(outcome.status_code, 500);
    assert!(harness.lookup.calls.lock().unwrap().is_empty());
    assert!(harness.sink.rows().is_empty());
}

#[test]
fn sink_failure_returns_failure_outcome() {
    let harness = Harness::new(StaticLookup::default());
    let ports = PipelinePorts {
        sink: Arc::new(FailingSink),
        ..harness.ports()
    };
    let pipeline = IngestPipeline::new(PipelineSettings::default(), ports);
    let event = encode_event("DATA_MESSAGE", &[REFERENCE_LINE]);

    assert!(matches!(pipeline.process(&event), Err(PipelineError::Sink(_))));
    assert_eq!(pipeline.handle(&event).status_code, 500);
}

#[test]
fn lookup_failure_still_writes_unenriched_rows() {
    let harness = Harness::new(StaticLookup::failing());
    let event = encode_event("DATA_MESSAGE", &[REFERENCE_LINE]);

    let outcome = pipeline(&harness, PipelineSettings::default()).handle(&event);

    assert_eq!(outcome.status_code, 200);
    let rows = harness.sink.rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].team_name.is_empty());
    assert!(harness.log.event_names().contains(&"lookup_failed"));
}

#[test]
fn multi_chunk_batches_pause_between_lookups() {
    let harness = Harness::new(StaticLookup::with(vec![
        enrichment("10.0.0.1", "a", "env-a"),
        enrichment("10.0.0.3", "c", "env-c"),
    ]));
    let lines: Vec<String> =
        ["10.0.0.1", "10.0.0.2", "10.0.0.3"].iter().map(|host| line("u", host, "SELECT a FROM t")).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let event = encode_event("DATA_MESSAGE", &refs);
    let settings = |merge| PipelineSettings {
        enrichment: EnrichmentSettings {
            chunk_size: 2,
            cooldown: Duration::from_millis(250),
            merge,
        },
        ..PipelineSettings::default()
    };

    pipeline(&harness, settings(EnrichmentMerge::FirstChunk)).process(&event).unwrap();
    let rows = harness.sink.rows();
    assert_eq!(rows[0].team_name, "a");
    assert!(rows[2].team_name.is_empty());
    assert_eq!(harness.cooldown.pauses.lock().unwrap().as_slice(), &[Duration::from_millis(250)]);
    assert_eq!(harness.lookup.calls.lock().unwrap().len(), 2);

    let corrected = Harness::new(StaticLookup::with(vec![
        enrichment("10.0.0.1", "a", "env-a"),
        enrichment("10.0.0.3", "c", "env-c"),
    ]));
    pipeline(&corrected, settings(EnrichmentMerge::AllChunks)).process(&event).unwrap();
    let rows = corrected.sink.rows();
    assert_eq!(rows[0].team_name, "a");
    assert_eq!(rows[2].team_name, "c");
}

#[test]
fn pipeline_log_never_contains_sql_text() {
    let harness = Harness::new(StaticLookup::default());
    let secret_sql = line("alice", "10.0.0.5", "SELECT ssn FROM people WHERE name = 'zed'");
    let event = encode_event("DATA_MESSAGE", &[&secret_sql, "broken"]);

    let _ = pipeline(&harness, PipelineSettings::default()).handle(&event);

    for event in harness.log.events() {
        let rendered = serde_json::to_string(&event).unwrap();
        assert!(!rendered.contains("ssn"));
        assert!(!rendered.contains("zed"));
    }
}
