// crates/query-stats-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: Shared fakes and event builders for query-stats-core tests.
// Purpose: Provide reusable ports and encoded events for pipeline tests.
// Dependencies: query-stats-core, base64, flate2, serde_json
// ============================================================================

//! ## Overview
//! Provides in-memory ports and helpers that encode log lines into a
//! CloudWatch subscription event.

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
#![allow(dead_code, reason = "Not every test binary uses every helper.")]

use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::GzEncoder;
use query_stats_core::Cooldown;
use query_stats_core::EnrichmentRecord;
use query_stats_core::HostLookup;
use query_stats_core::InMemoryStatsSink;
use query_stats_core::LookupError;
use query_stats_core::MemoryPipelineLog;
use query_stats_core::PipelinePorts;
use query_stats_core::QueryStatRow;
use query_stats_core::SinkError;
use query_stats_core::StatsSink;
use serde_json::json;

/// Reference proxy log line.
pub const REFERENCE_LINE: &str = "scripts-read-db|x|2024-01-01 10:00:00|0.5|alice_:db:schema:10.0.0.5|SELECT * FROM users WHERE id = '5'";

/// Builds a log line in the identity-first layout.
pub fn line(user: &str, host: &str, sql: &str) -> String {
    format!("svc|x|2024-01-01 10:00:00|{user}_:db:schema:{host}|0.25|{sql}")
}

/// Encodes messages into a subscription event body.
pub fn encode_event(message_type: &str, messages: &[&str]) -> Vec<u8> {
    let events: Vec<_> = messages
        .iter()
        .enumerate()
        .map(|(index, message)| json!({"id": index.to_string(), "timestamp": 1, "message": message}))
        .collect();
    let payload = json!({
        "messageType": message_type,
        "owner": "123456789012",
        "logGroup": "/maxscale/query",
        "logStream": "stream-1",
        "subscriptionFilters": ["query-stats"],
        "logEvents": events,
    });
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload.to_string().as_bytes()).unwrap();
    let data = STANDARD.encode(encoder.finish().unwrap());
    json!({"awslogs": {"data": data}}).to_string().into_bytes()
}

/// Builds an enrichment record.
pub fn enrichment(ip: &str, team: &str, environment: &str) -> EnrichmentRecord {
    EnrichmentRecord {
        ip: ip.to_string(),
        launch_time: "2023-05-01 08:00:00".to_string(),
        team_name: team.to_string(),
        environment_name: environment.to_string(),
    }
}

/// Lookup answering from a fixed inventory, recording every chunk.
#[derive(Default)]
pub struct StaticLookup {
    pub inventory: Vec<EnrichmentRecord>,
    pub fail: bool,
    pub calls: Mutex<Vec<Vec<String>>>,
}

impl StaticLookup {
    pub fn with(inventory: Vec<EnrichmentRecord>) -> Self {
        Self {
            inventory,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl HostLookup for StaticLookup {
    fn resolve(&self, hosts: &[String]) -> Result<Vec<EnrichmentRecord>, LookupError> {
        self.calls.lock().unwrap().push(hosts.to_vec());
        if self.fail {
            return Err(LookupError::Backend("unavailable".to_string()));
        }
        Ok(self.inventory.iter().filter(|record| hosts.contains(&record.ip)).cloned().collect())
    }
}

/// Cooldown that records requested pauses without sleeping.
#[derive(Default)]
pub struct RecordingCooldown {
    pub pauses: Mutex<Vec<Duration>>,
}

impl Cooldown for RecordingCooldown {
    fn pause(&self, duration: Duration) {
        self.pauses.lock().unwrap().push(duration);
    }
}

/// Sink that always fails.
pub struct FailingSink;

impl StatsSink for FailingSink {
    fn write(&self, _rows: &[QueryStatRow]) -> Result<usize, SinkError> {
        Err(SinkError::Connection("refused".to_string()))
    }
}

/// Test harness holding shared handles to every port.
pub struct Harness {
    pub lookup: Arc<StaticLookup>,
    pub sink: Arc<InMemoryStatsSink>,
    pub cooldown: Arc<RecordingCooldown>,
    pub log: Arc<MemoryPipelineLog>,
}

impl Harness {
    pub fn new(lookup: StaticLookup) -> Self {
        Self {
            lookup: Arc::new(lookup),
            sink: Arc::new(InMemoryStatsSink::default()),
            cooldown: Arc::new(RecordingCooldown::default()),
            log: Arc::new(MemoryPipelineLog::default()),
        }
    }

    pub fn ports(&self) -> PipelinePorts {
        PipelinePorts {
            lookup: self.lookup.clone(),
            sink: self.sink.clone(),
            cooldown: self.cooldown.clone(),
            log: self.log.clone(),
        }
    }
}
