//! Concurrent LLM extraction over document chunks.
//!
//! A bounded worker pool drives one [`ChunkExtractor`] per chunk; a shared
//! [`ProgressRegistry`] lets the pipeline report hung chunks without killing
//! workers. Results land in position-indexed slots so the merge stays
//! deterministic whatever order chunks finish in.

pub mod cache;
pub mod merge;
pub mod parse;
pub mod progress;
pub mod prompt;
pub mod worker;

pub use merge::merge;
pub use progress::{ProgressRegistry, StalledChunk};
pub use worker::{ChunkExtractor, ChunkOutcome};

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tracing::{info, warn};

use crate::chunker::Chunk;
use crate::config::ExtractionConfig;
use crate::traits::Llm;
use crate::types::ExtractionResult;

/// Counts for one extraction batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    /// Chunks that produced at least one entity or relationship.
    pub succeeded: usize,
    /// Chunks that stayed empty through all retries.
    pub empty: usize,
    /// Chunks that exhausted their attempts on errors.
    pub failed: usize,
    /// Chunks abandoned when the global deadline fired.
    pub cancelled: usize,
}

impl BatchSummary {
    /// Chunks that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.succeeded + self.empty + self.failed
    }
}

/// Output of one batch: per-chunk slots aligned with the input order, plus
/// the summary. A `None` slot is a failed or cancelled chunk.
#[derive(Debug)]
pub struct BatchResult {
    pub results: Vec<Option<ExtractionResult>>,
    pub summary: BatchSummary,
}

/// Drives chunk extraction through a bounded worker pool.
pub struct ExtractionPipeline {
    llm: Arc<dyn Llm>,
    config: ExtractionConfig,
}

impl ExtractionPipeline {
    pub fn new(llm: Arc<dyn Llm>, config: ExtractionConfig) -> Self {
        Self { llm, config }
    }

    /// Extract every chunk and return slot-aligned results.
    ///
    /// A single chunk's permanent failure never aborts the batch. The drive
    /// loop selects over the next finished chunk, a hang-detection poll, and
    /// the global wall-clock deadline; when the deadline fires, unfinished
    /// chunks are dropped and the batch proceeds with what it has.
    pub async fn run(&self, chunks: &[Chunk]) -> BatchResult {
        let total = chunks.len();
        let mut results: Vec<Option<ExtractionResult>> = vec![None; total];
        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        if total == 0 {
            return BatchResult { results, summary };
        }

        let progress = ProgressRegistry::new();
        let extractor = Arc::new(ChunkExtractor::new(
            self.llm.clone(),
            self.config.clone(),
            progress.clone(),
        ));

        info!(
            chunks = total,
            workers = self.config.workers,
            model = self.llm.model_name(),
            "starting extraction batch"
        );

        let mut stream = futures::stream::iter(chunks.iter().enumerate().map(|(slot, chunk)| {
            let extractor = Arc::clone(&extractor);
            async move { (slot, extractor.extract(chunk).await) }
        }))
        .buffer_unordered(self.config.workers.max(1));

        let deadline = tokio::time::sleep(self.config.global_timeout());
        tokio::pin!(deadline);
        let mut poll = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.poll_interval(),
            self.config.poll_interval(),
        );

        loop {
            tokio::select! {
                next = stream.next() => {
                    let Some((slot, outcome)) = next else { break };
                    match outcome {
                        ChunkOutcome::Succeeded(result) => {
                            summary.succeeded += 1;
                            results[slot] = Some(result);
                        }
                        ChunkOutcome::Empty => {
                            summary.empty += 1;
                            results[slot] = Some(ExtractionResult::default());
                        }
                        ChunkOutcome::Failed => {
                            summary.failed += 1;
                        }
                    }
                }
                _ = poll.tick() => {
                    for stalled in progress.stalled(self.config.hang_threshold()) {
                        warn!(
                            chunk = stalled.chunk_index,
                            step = stalled.step,
                            stalled_secs = stalled.stalled_secs,
                            "chunk has made no progress past the hang threshold"
                        );
                    }
                }
                _ = &mut deadline => {
                    summary.cancelled = total - summary.processed();
                    warn!(
                        timeout_secs = self.config.global_timeout_secs,
                        cancelled = summary.cancelled,
                        "global timeout reached, abandoning unfinished chunks"
                    );
                    break;
                }
            }
        }

        info!(
            succeeded = summary.succeeded,
            empty = summary.empty,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "extraction batch finished"
        );
        BatchResult { results, summary }
    }
}
