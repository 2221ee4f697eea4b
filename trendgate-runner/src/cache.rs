//! In-memory run cache keyed by content hash.
//!
//! Keys are `RunFingerprint`s (blake3 over the candle series and canonical
//! parameter JSON), so a hit is only possible for an identical input pair.
//! The cache is bounded: once full, the oldest insertion is evicted first.
//! It lives outside the pipeline, which never reads or writes it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use trendgate_core::fingerprint::RunFingerprint;
use trendgate_core::metrics::RunMetrics;

/// What the optimizer keeps of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRun {
    pub metrics: RunMetrics,
    pub final_capital: f64,
}

/// Hit/miss counters since construction or the last `clear`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded FIFO cache of run results.
#[derive(Debug)]
pub struct RunCache {
    capacity: usize,
    entries: HashMap<RunFingerprint, Arc<CachedRun>>,
    order: VecDeque<RunFingerprint>,
    stats: CacheStats,
}

impl RunCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(4096)),
            order: VecDeque::with_capacity(capacity.min(4096)),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &RunFingerprint) -> Option<Arc<CachedRun>> {
        match self.entries.get(key) {
            Some(run) => {
                self.stats.hits += 1;
                Some(Arc::clone(run))
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, key: &RunFingerprint) -> bool {
        self.entries.contains_key(key)
    }

    /// Store a run, evicting the oldest entries beyond capacity.
    pub fn insert(&mut self, key: RunFingerprint, run: Arc<CachedRun>) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.insert(key.clone(), run).is_none() {
            self.order.push_back(key);
        }
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            self.stats.evictions += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.stats = CacheStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::test_support::metrics;

    fn key(n: u8) -> RunFingerprint {
        RunFingerprint(format!("{n:064x}"))
    }

    fn run(total_return: f64) -> Arc<CachedRun> {
        Arc::new(CachedRun {
            metrics: metrics(total_return, 0.5, 1.0),
            final_capital: 10_000.0,
        })
    }

    #[test]
    fn put_then_get() {
        let mut cache = RunCache::new(4);
        assert!(cache.get(&key(1)).is_none());

        cache.insert(key(1), run(3.0));
        let hit = cache.get(&key(1)).unwrap();
        assert_eq!(hit.metrics.total_return_percent, 3.0);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, evictions: 0 });
    }

    #[test]
    fn evicts_oldest_first() {
        let mut cache = RunCache::new(2);
        cache.insert(key(1), run(1.0));
        cache.insert(key(2), run(2.0));
        cache.insert(key(3), run(3.0));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)) && cache.contains(&key(3)));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn reinserting_a_key_keeps_its_slot() {
        let mut cache = RunCache::new(2);
        cache.insert(key(1), run(1.0));
        cache.insert(key(1), run(1.5));
        cache.insert(key(2), run(2.0));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(1)).unwrap().metrics.total_return_percent, 1.5);
    }

    #[test]
    fn zero_capacity_disables() {
        let mut cache = RunCache::new(0);
        cache.insert(key(1), run(1.0));
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_resets_entries_and_stats() {
        let mut cache = RunCache::new(4);
        cache.insert(key(1), run(1.0));
        let _ = cache.get(&key(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
