// crates/query-stats-core/src/runtime/enrichment.rs
// ============================================================================
// Module: Host Enrichment Joiner
// Description: Chunked inventory lookups joined back onto parsed records.
// Purpose: Attach team and environment ownership to each record by host IP.
// Dependencies: crate::core, crate::interfaces, crate::telemetry, serde
// ============================================================================

//! ## Overview
//! Distinct non-empty hosts are collected in first-seen order, split into
//! chunks no larger than the inventory filter limit, and resolved one chunk
//! at a time with a cooldown between calls. A failed chunk is logged and
//! treated as an empty result. Under [`EnrichmentMerge::FirstChunk`] only the
//! first chunk that returned anything is used for matching, so hosts resolved
//! by later chunks stay unenriched; [`EnrichmentMerge::AllChunks`] merges every
//! chunk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::EnrichmentRecord;
use crate::core::ParsedQueryStat;
use crate::interfaces::Cooldown;
use crate::interfaces::HostLookup;
use crate::telemetry::PipelineEventKind;
use crate::telemetry::PipelineLog;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest number of filter values a single inventory lookup accepts.
pub const MAX_LOOKUP_CHUNK: usize = 200;

/// Default pause between successive lookups.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

// ============================================================================
// SECTION: Settings
// ============================================================================

/// How chunk results are combined before matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentMerge {
    /// Only the first chunk with results is matched against.
    #[default]
    FirstChunk,
    /// All chunk results are matched against.
    AllChunks,
}

/// Enrichment settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentSettings {
    /// Hosts per lookup call, at most [`MAX_LOOKUP_CHUNK`].
    pub chunk_size: usize,
    /// Pause between successive lookup calls.
    pub cooldown: Duration,
    /// Chunk result merge policy.
    pub merge: EnrichmentMerge,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            chunk_size: MAX_LOOKUP_CHUNK,
            cooldown: DEFAULT_COOLDOWN,
            merge: EnrichmentMerge::default(),
        }
    }
}

/// Counters describing one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentSummary {
    /// Distinct non-empty hosts looked up.
    pub hosts: usize,
    /// Lookup calls made.
    pub chunks: usize,
    /// Lookup calls that failed.
    pub failed_chunks: usize,
    /// Inventory records available for matching.
    pub candidates: usize,
    /// Records that received ownership metadata.
    pub matched_records: usize,
}

// ============================================================================
// SECTION: Chunking
// ============================================================================

/// Splits hosts into ordered chunks of at most `size` entries.
///
/// A zero size is treated as one.
#[must_use]
pub fn divide_into_chunks(hosts: &[String], size: usize) -> Vec<Vec<String>> {
    hosts.chunks(size.max(1)).map(<[String]>::to_vec).collect()
}

/// Returns distinct non-empty hosts in first-seen order.
#[must_use]
pub fn distinct_hosts(records: &[ParsedQueryStat]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|record| !record.host.is_empty())
        .filter(|record| seen.insert(record.host.as_str()))
        .map(|record| record.host.clone())
        .collect()
}

// ============================================================================
// SECTION: Joiner
// ============================================================================

/// Resolves record hosts through a [`HostLookup`] and merges ownership back.
pub struct HostEnrichmentJoiner {
    /// Chunking, cooldown and merge settings.
    settings: EnrichmentSettings,
    /// Pause implementation between lookups.
    cooldown: Arc<dyn Cooldown>,
}

impl HostEnrichmentJoiner {
    /// Creates a joiner.
    #[must_use]
    pub fn new(settings: EnrichmentSettings, cooldown: Arc<dyn Cooldown>) -> Self {
        Self {
            settings,
            cooldown,
        }
    }

    /// Enriches records in place; only team and environment are modified.
    ///
    /// Lookup failures never propagate. Unmatched records keep empty strings.
    pub fn enrich(
        &self,
        records: &mut [ParsedQueryStat],
        lookup: &dyn HostLookup,
        log: &dyn PipelineLog,
    ) -> EnrichmentSummary {
        let hosts = distinct_hosts(records);
        let chunks = divide_into_chunks(&hosts, self.settings.chunk_size.min(MAX_LOOKUP_CHUNK));
        let mut summary = EnrichmentSummary {
            hosts: hosts.len(),
            ..EnrichmentSummary::default()
        };

        let mut results: Vec<Vec<EnrichmentRecord>> = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 {
                self.cooldown.pause(self.settings.cooldown);
            }
            summary.chunks += 1;
            match lookup.resolve(chunk) {
                Ok(found) => {
                    log.emit(PipelineEventKind::ChunkResolved {
                        chunk: index,
                        hosts: chunk.len(),
                        instances: found.len(),
                    });
                    if !found.is_empty() {
                        results.push(found);
                    }
                }
                Err(err) => {
                    summary.failed_chunks += 1;
                    log.emit(PipelineEventKind::LookupFailed {
                        chunk: index,
                        hosts: chunk.len(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let candidates: Vec<EnrichmentRecord> = match self.settings.merge {
            EnrichmentMerge::FirstChunk => results.into_iter().next().unwrap_or_default(),
            EnrichmentMerge::AllChunks => results.into_iter().flatten().collect(),
        };
        summary.candidates = candidates.len();

        let mut by_ip: HashMap<&str, &EnrichmentRecord> = HashMap::new();
        for candidate in &candidates {
            by_ip.entry(candidate.ip.as_str()).or_insert(candidate);
        }
        for record in records.iter_mut() {
            if let Some(found) = by_ip.get(record.host.as_str()) {
                record.apply_enrichment(found);
                summary.matched_records += 1;
            }
        }

        log.emit(PipelineEventKind::RecordsEnriched {
            records: records.len(),
            matched: summary.matched_records,
            chunks: summary.chunks,
            failed_chunks: summary.failed_chunks,
            merge: self.settings.merge,
        });
        summary
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
