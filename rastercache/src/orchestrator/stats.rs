//! Get-or-create statistics tracking.
//!
//! Counters are updated from every request thread and read for periodic
//! logging, so they are plain atomics with relaxed ordering.

use crate::cache::CacheOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct OrchestratorCounters {
    /// Served from a write still in flight
    memory_hits: AtomicU64,
    /// Served from the artifact store
    disk_hits: AtomicU64,
    misses: AtomicU64,
    /// Lock wait timed out
    failures: AtomicU64,
    produce_errors: AtomicU64,
    queued_writes: AtomicU64,
    sync_writes: AtomicU64,
    sync_write_failures: AtomicU64,
    /// Writes skipped because another job for the key was already in flight
    deferred_writes: AtomicU64,
}

impl OrchestratorCounters {
    pub(crate) fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_produce_error(&self) {
        self.produce_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queued_write(&self) {
        self.queued_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sync_write(&self) {
        self.sync_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sync_write_failure(&self) {
        self.sync_write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_write(&self) {
        self.deferred_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> OrchestratorStats {
        OrchestratorStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            produce_errors: self.produce_errors.load(Ordering::Relaxed),
            queued_writes: self.queued_writes.load(Ordering::Relaxed),
            sync_writes: self.sync_writes.load(Ordering::Relaxed),
            sync_write_failures: self.sync_write_failures.load(Ordering::Relaxed),
            deferred_writes: self.deferred_writes.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of orchestrator activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub failures: u64,
    /// Calls whose producer returned an error
    pub produce_errors: u64,
    pub queued_writes: u64,
    /// Writes done on the request thread after the queue refused them
    pub sync_writes: u64,
    pub sync_write_failures: u64,
    pub deferred_writes: u64,
}

impl OrchestratorStats {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.disk_hits
    }

    /// Calls that ended with a cache outcome.
    pub fn requests(&self) -> u64 {
        self.hits() + self.misses + self.failures
    }

    /// Count for one outcome.
    pub fn count(&self, outcome: CacheOutcome) -> u64 {
        match outcome {
            CacheOutcome::Hit => self.hits(),
            CacheOutcome::Miss => self.misses,
            CacheOutcome::Failed => self.failures,
        }
    }

    /// Hit rate (0.0 to 1.0) over calls that ended with a cache outcome.
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }

    /// Share of persisted misses that fell back to a synchronous write.
    pub fn sync_fallback_ratio(&self) -> f64 {
        let total = self.queued_writes + self.sync_writes + self.sync_write_failures;
        if total == 0 {
            0.0
        } else {
            (self.sync_writes + self.sync_write_failures) as f64 / total as f64
        }
    }
}
