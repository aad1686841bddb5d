//! Batched extraction with bounded concurrency.

use std::collections::HashMap;

use futures::future::join_all;
use serde::Serialize;
use tracing::info;

use super::extract::{DetailExtractor, ExtractOutcome};
use crate::cache::KvStore;
use crate::fetch::Fetcher;
use crate::types::record::ExtractionStatus;
use crate::types::{ExtractOptions, SearchResultStub};

/// Progress notification emitted after each completed item.
#[derive(Debug, Clone, Serialize)]
pub struct Progress<'a> {
    /// 1-based count of completed items.
    pub current: usize,
    pub total: usize,
    pub status: ExtractionStatus,
    /// The stub that just finished.
    pub stub: &'a SearchResultStub,
}

/// Per-source counters in the batch summary.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SourceStats {
    pub total: usize,
    pub successful: usize,
    pub cached: usize,
    pub failed: usize,
}

/// Aggregate counters for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub successful: usize,
    pub cached: usize,
    pub failed: usize,

    /// Wall-clock duration of the whole batch.
    pub elapsed_ms: u64,

    /// Mean extraction time across items that actually fetched
    /// (cache hits are excluded, they report zero).
    pub avg_extraction_ms: u64,

    pub by_source: HashMap<String, SourceStats>,
}

/// Batch results, in input order, plus the summary.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub outcomes: Vec<ExtractOutcome>,
    pub stats: BatchStats,
}

/// Extract every stub with at most `max_concurrent_extractions` in
/// flight, pausing `chunk_delay_ms` between chunks.
///
/// Output order matches input order. One item's failure never affects
/// its neighbors; failed items come back as error-status outcomes.
pub async fn extract_batch<F, S, P>(
    extractor: &DetailExtractor<F, S>,
    stubs: &[SearchResultStub],
    options: &ExtractOptions,
    mut on_progress: P,
) -> BatchOutcome
where
    F: Fetcher,
    S: KvStore,
    P: FnMut(&Progress),
{
    let started = std::time::Instant::now();
    let total = stubs.len();
    let chunk_size = extractor.config().max_concurrent_extractions.max(1);
    let chunk_delay = extractor.config().chunk_delay_ms;

    let mut outcomes: Vec<ExtractOutcome> = Vec::with_capacity(total);
    for (chunk_index, chunk) in stubs.chunks(chunk_size).enumerate() {
        if chunk_index > 0 && chunk_delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(chunk_delay)).await;
        }

        let results = join_all(
            chunk
                .iter()
                .map(|stub| extractor.extract_one(stub, options)),
        )
        .await;

        for (stub, outcome) in chunk.iter().zip(results) {
            on_progress(&Progress {
                current: outcomes.len() + 1,
                total,
                status: outcome.status,
                stub,
            });
            outcomes.push(outcome);
        }
    }

    let stats = summarize(stubs, &outcomes, started.elapsed().as_millis() as u64);
    info!(
        total = stats.total,
        successful = stats.successful,
        cached = stats.cached,
        failed = stats.failed,
        elapsed_ms = stats.elapsed_ms,
        "batch complete"
    );
    BatchOutcome { outcomes, stats }
}

fn summarize(stubs: &[SearchResultStub], outcomes: &[ExtractOutcome], elapsed_ms: u64) -> BatchStats {
    let mut stats = BatchStats {
        total: outcomes.len(),
        elapsed_ms,
        ..Default::default()
    };

    let mut fetched_ms: u64 = 0;
    let mut fetched: u64 = 0;
    for (stub, outcome) in stubs.iter().zip(outcomes) {
        let source = stats.by_source.entry(stub.source.clone()).or_default();
        source.total += 1;
        match outcome.status {
            ExtractionStatus::Cached => {
                stats.cached += 1;
                source.cached += 1;
            }
            ExtractionStatus::Error => {
                stats.failed += 1;
                source.failed += 1;
            }
            ExtractionStatus::Success | ExtractionStatus::Partial => {
                stats.successful += 1;
                source.successful += 1;
                if let Some(meta) = &outcome.record.meta {
                    fetched_ms += meta.extraction_time_ms;
                    fetched += 1;
                }
            }
        }
    }
    if fetched > 0 {
        stats.avg_extraction_ms = fetched_ms / fetched;
    }
    stats
}
