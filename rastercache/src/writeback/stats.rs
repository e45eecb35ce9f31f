//! Write queue statistics.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct WriteQueueCounters {
    accepted: AtomicU64,
    rejected_duplicate: AtomicU64,
    rejected_over_budget: AtomicU64,
    rejected_scheduling: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl WriteQueueCounters {
    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_duplicate(&self) {
        self.rejected_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_over_budget(&self) {
        self.rejected_over_budget.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scheduling_failure(&self) {
        self.rejected_scheduling.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, outstanding_jobs: usize, outstanding_bytes: usize) -> WriteQueueStats {
        WriteQueueStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected_duplicate: self.rejected_duplicate.load(Ordering::Relaxed),
            rejected_over_budget: self.rejected_over_budget.load(Ordering::Relaxed),
            rejected_scheduling: self.rejected_scheduling.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            outstanding_jobs,
            outstanding_bytes,
        }
    }
}

/// Snapshot of write queue activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteQueueStats {
    pub accepted: u64,
    pub rejected_duplicate: u64,
    pub rejected_over_budget: u64,
    pub rejected_scheduling: u64,
    /// Writes that returned successfully.
    pub completed: u64,
    /// Writes that returned an error or panicked.
    pub failed: u64,
    pub outstanding_jobs: usize,
    pub outstanding_bytes: usize,
}

impl WriteQueueStats {
    /// Total refusals across all reasons.
    pub fn rejected(&self) -> u64 {
        self.rejected_duplicate + self.rejected_over_budget + self.rejected_scheduling
    }

    /// Share of offered jobs that were refused (0.0 to 1.0).
    pub fn rejection_ratio(&self) -> f64 {
        let offered = self.accepted + self.rejected();
        if offered == 0 {
            0.0
        } else {
            self.rejected() as f64 / offered as f64
        }
    }
}
