//! Shared progress registry for hang detection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Latest step reported by a worker for one chunk.
#[derive(Debug, Clone)]
struct ProgressEntry {
    step: &'static str,
    since: Instant,
}

/// A chunk with no progress update for longer than the hang threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledChunk {
    pub chunk_index: usize,
    pub step: &'static str,
    pub stalled_secs: u64,
}

/// Cloneable registry of per-chunk progress, shared between workers and the
/// pipeline's hang monitor. The only cross-worker mutable state.
#[derive(Debug, Clone, Default)]
pub struct ProgressRegistry {
    inner: Arc<Mutex<HashMap<usize, ProgressEntry>>>,
}

impl ProgressRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `chunk_index` has entered `step` now.
    pub fn update(&self, chunk_index: usize, step: &'static str) {
        let mut map = self.inner.lock().unwrap();
        map.insert(
            chunk_index,
            ProgressEntry {
                step,
                since: Instant::now(),
            },
        );
    }

    /// Remove a finished chunk so it can no longer be reported as stalled.
    pub fn finish(&self, chunk_index: usize) {
        self.inner.lock().unwrap().remove(&chunk_index);
    }

    /// Chunks whose last update is older than `threshold`, ordered by index.
    pub fn stalled(&self, threshold: Duration) -> Vec<StalledChunk> {
        let map = self.inner.lock().unwrap();
        let now = Instant::now();
        let mut stalled: Vec<StalledChunk> = map
            .iter()
            .filter_map(|(&chunk_index, entry)| {
                let age = now.duration_since(entry.since);
                (age >= threshold).then(|| StalledChunk {
                    chunk_index,
                    step: entry.step,
                    stalled_secs: age.as_secs(),
                })
            })
            .collect();
        stalled.sort_by_key(|s| s.chunk_index);
        stalled
    }

    /// Number of chunks currently in flight.
    pub fn active(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_and_finish() {
        let registry = ProgressRegistry::new();
        registry.update(3, "llm_call");
        assert_eq!(registry.active(), 1);
        registry.finish(3);
        assert_eq!(registry.active(), 0);
    }

    #[test]
    fn test_fresh_entries_not_stalled() {
        let registry = ProgressRegistry::new();
        registry.update(0, "llm_call");
        assert!(registry.stalled(Duration::from_secs(300)).is_empty());
    }

    #[test]
    fn test_zero_threshold_reports_everything() {
        let registry = ProgressRegistry::new();
        registry.update(2, "parse");
        registry.update(0, "llm_call");
        let stalled = registry.stalled(Duration::ZERO);
        assert_eq!(stalled.len(), 2);
        assert_eq!(stalled[0].chunk_index, 0);
        assert_eq!(stalled[1].chunk_index, 2);
    }

    #[test]
    fn test_update_resets_the_clock() {
        let registry = ProgressRegistry::new();
        registry.update(1, "llm_call");
        registry.update(1, "parse");
        let stalled = registry.stalled(Duration::ZERO);
        assert_eq!(stalled.len(), 1);
        assert_eq!(stalled[0].step, "parse");
    }
}
