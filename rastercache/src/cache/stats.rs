//! Memory cache statistics tracking and reporting.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters updated on the cache hot path.
#[derive(Debug, Default)]
pub(crate) struct MemoryCacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    insertions: AtomicU64,
    oversized: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    cleanup_passes: AtomicU64,
    redundant_fills: AtomicU64,
}

impl MemoryCacheCounters {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_insertion(&self) {
        self.insertions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oversized(&self) {
        self.oversized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_expirations(&self, count: u64) {
        self.expirations.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_cleanup_pass(&self) {
        self.cleanup_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_redundant_fill(&self) {
        self.redundant_fills.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, weight_bytes: u64, entry_count: usize) -> MemoryCacheStats {
        MemoryCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            insertions: self.insertions.load(Ordering::Relaxed),
            oversized_rejections: self.oversized.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            cleanup_passes: self.cleanup_passes.load(Ordering::Relaxed),
            redundant_fills: self.redundant_fills.load(Ordering::Relaxed),
            weight_bytes,
            entry_count,
        }
    }
}

/// Point-in-time view of memory cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    /// Values refused because their weight alone exceeded the ceiling.
    pub oversized_rejections: u64,
    /// Entries removed to get back under the weight ceiling.
    pub evictions: u64,
    /// Entries removed because their sliding window lapsed.
    pub expirations: u64,
    pub cleanup_passes: u64,
    /// Fills performed without the per-key lock after a lock timeout.
    pub redundant_fills: u64,
    pub weight_bytes: u64,
    pub entry_count: usize,
}

impl MemoryCacheStats {
    /// Hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(MemoryCacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_snapshot_reflects_counters() {
        let counters = MemoryCacheCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        counters.record_evictions(4);

        let stats = counters.snapshot(1_024, 3);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.evictions, 4);
        assert_eq!(stats.weight_bytes, 1_024);
        assert_eq!(stats.entry_count, 3);
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
