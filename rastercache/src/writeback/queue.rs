//! Bounded write-behind queue.
//!
//! Outstanding jobs are indexed by [`CacheKey`] so duplicate detection and
//! in-flight reads are O(1). Admission (duplicate check, budget check,
//! insert) happens atomically under one short lock. Each admitted job
//! carries a completion guard that removes its index entry when the write
//! finishes, fails, panics, or is dropped unrun by the scheduler, so a bad
//! writer can never pin queue capacity.

use crate::cache::CacheKey;
use crate::diagnostics::Diagnostics;
use crate::writeback::job::AsyncWriteJob;
use crate::writeback::scheduler::{ScheduleError, WriteScheduler, WriteTask};
use crate::writeback::stats::{WriteQueueCounters, WriteQueueStats};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why the queue refused a job. The caller should write synchronously.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueRejected {
    /// A job with the same key is already outstanding and is authoritative.
    #[error("a write for this key is already outstanding")]
    Duplicate,

    /// Admitting the job would push buffered bytes over the ceiling.
    #[error("queue budget exceeded: {requested} requested, {outstanding} outstanding, limit {limit}")]
    OverBudget {
        requested: usize,
        outstanding: usize,
        limit: usize,
    },

    /// The background scheduler would not take the job.
    #[error("background scheduling failed: {0}")]
    SchedulingFailed(#[from] ScheduleError),
}

/// A background write that did not complete. Reported to diagnostics only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriterFailure {
    /// The writer returned an error.
    #[error("writer returned an error: {0}")]
    Returned(String),

    /// The writer panicked.
    #[error("writer panicked: {0}")]
    Panicked(String),
}

/// Index entry for an admitted job.
struct Outstanding {
    id: u64,
    buffer: Arc<Vec<u8>>,
    charged: usize,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<CacheKey, Outstanding>,
    bytes: usize,
}

struct Shared {
    state: Mutex<QueueState>,
    idle: Condvar,
    max_bytes: usize,
    counters: WriteQueueCounters,
    diagnostics: Arc<dyn Diagnostics>,
}

/// Fire-and-forget persistence queue with duplicate suppression and a byte budget.
///
/// # Example
///
/// ```
/// use rastercache::cache::CacheKey;
/// use rastercache::diagnostics::NoOpDiagnostics;
/// use rastercache::writeback::{AsyncWriteJob, BoundedAsyncWriteQueue, TokioScheduler};
/// use std::sync::Arc;
/// use std::time::{Duration, SystemTime};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let queue = BoundedAsyncWriteQueue::new(
///     1024 * 1024,
///     Arc::new(TokioScheduler::new(runtime.handle().clone(), 4)),
///     Arc::new(NoOpDiagnostics),
/// );
///
/// let job = AsyncWriteJob::new(CacheKey::new("a.jpg", SystemTime::now()), Arc::new(vec![1, 2, 3]));
/// queue
///     .queue(job, |job| std::fs::write(std::env::temp_dir().join("a.jpg.cache"), job.data()))
///     .expect("queue has room");
/// assert!(queue.drain(Duration::from_secs(5)));
/// ```
pub struct BoundedAsyncWriteQueue {
    shared: Arc<Shared>,
    scheduler: Arc<dyn WriteScheduler>,
    next_id: AtomicU64,
}

impl BoundedAsyncWriteQueue {
    /// Create a queue holding at most `max_bytes` of buffer capacity.
    pub fn new(
        max_bytes: usize,
        scheduler: Arc<dyn WriteScheduler>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                idle: Condvar::new(),
                max_bytes,
                counters: WriteQueueCounters::default(),
                diagnostics,
            }),
            scheduler,
            next_id: AtomicU64::new(0),
        }
    }

    /// Offer a job for background persistence. Never blocks.
    ///
    /// On acceptance `writer` later runs on a background worker with the job;
    /// whatever it returns (or if it panics) the job is then removed from the
    /// index. Errors and panics go to the diagnostics collaborator and never
    /// back to this caller.
    pub fn queue<W, E>(&self, job: AsyncWriteJob, writer: W) -> Result<(), QueueRejected>
    where
        W: FnOnce(&AsyncWriteJob) -> Result<(), E> + Send + 'static,
        E: Display,
    {
        let charged = job.charged_bytes();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        {
            let mut state = self.shared.state.lock();

            if state.jobs.contains_key(job.key()) {
                drop(state);
                self.shared.counters.record_duplicate();
                debug!(key = %job.key(), "Write already outstanding - rejecting duplicate");
                return Err(QueueRejected::Duplicate);
            }

            let within_budget = state
                .bytes
                .checked_add(charged)
                .is_some_and(|total| total <= self.shared.max_bytes);
            if !within_budget {
                let outstanding = state.bytes;
                drop(state);
                self.shared.counters.record_over_budget();
                debug!(
                    key = %job.key(),
                    requested = charged,
                    outstanding,
                    limit = self.shared.max_bytes,
                    "Write queue over budget - rejecting"
                );
                return Err(QueueRejected::OverBudget {
                    requested: charged,
                    outstanding,
                    limit: self.shared.max_bytes,
                });
            }

            state.jobs.insert(
                job.key().clone(),
                Outstanding {
                    id,
                    buffer: Arc::clone(job.buffer()),
                    charged,
                },
            );
            state.bytes += charged;
        }

        let completion = Completion {
            shared: Arc::clone(&self.shared),
            key: job.key().clone(),
            id,
        };
        let shared = Arc::clone(&self.shared);
        let task: WriteTask = Box::new(move || {
            let _completion = completion;
            run_writer(&shared, &job, writer);
        });

        // A refused task is dropped inside `schedule`, which releases its index entry.
        if let Err(err) = self.scheduler.schedule(task) {
            self.shared.counters.record_scheduling_failure();
            warn!(error = %err, "Background write could not be scheduled");
            return Err(QueueRejected::SchedulingFailed(err));
        }

        self.shared.counters.record_accepted();
        Ok(())
    }

    /// Bytes of an outstanding job, if one is queued for `key`.
    ///
    /// Lets readers serve an artifact that is still being persisted.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<u8>>> {
        self.shared
            .state
            .lock()
            .jobs
            .get(key)
            .map(|outstanding| Arc::clone(&outstanding.buffer))
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.shared.state.lock().jobs.contains_key(key)
    }

    pub fn outstanding_jobs(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }

    /// Summed buffer capacity of outstanding jobs.
    pub fn outstanding_bytes(&self) -> usize {
        self.shared.state.lock().bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.shared.max_bytes
    }

    /// Block until no job is outstanding or `timeout` elapses.
    ///
    /// Returns `true` if the queue is empty.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();
        while !state.jobs.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.shared.idle.wait_until(&mut state, deadline).timed_out() {
                        return state.jobs.is_empty();
                    }
                }
                None => self.shared.idle.wait(&mut state),
            }
        }
        true
    }

    pub fn stats(&self) -> WriteQueueStats {
        let (jobs, bytes) = {
            let state = self.shared.state.lock();
            (state.jobs.len(), state.bytes)
        };
        self.shared.counters.snapshot(jobs, bytes)
    }

    /// Log a summary of queue activity at info level.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            accepted = stats.accepted,
            rejected = stats.rejected(),
            rejected_duplicate = stats.rejected_duplicate,
            rejected_over_budget = stats.rejected_over_budget,
            rejected_scheduling = stats.rejected_scheduling,
            completed = stats.completed,
            failed = stats.failed,
            outstanding_jobs = stats.outstanding_jobs,
            outstanding_bytes = stats.outstanding_bytes,
            limit = self.shared.max_bytes,
            "Write queue statistics"
        );
    }
}

/// Runs the writer, containing any error or panic.
fn run_writer<W, E>(shared: &Shared, job: &AsyncWriteJob, writer: W)
where
    W: FnOnce(&AsyncWriteJob) -> Result<(), E>,
    E: Display,
{
    let failure = match panic::catch_unwind(AssertUnwindSafe(|| writer(job))) {
        Ok(Ok(())) => {
            shared.counters.record_completed();
            debug!(
                key = %job.key(),
                bytes = job.data().len(),
                waited_ms = job.age().as_millis() as u64,
                "Background write complete"
            );
            return;
        }
        Ok(Err(err)) => WriterFailure::Returned(err.to_string()),
        Err(payload) => WriterFailure::Panicked(panic_message(payload.as_ref())),
    };

    shared.counters.record_failed();
    shared.diagnostics.writer_failed(job.key(), &failure);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Removes a job's index entry when dropped.
struct Completion {
    shared: Arc<Shared>,
    key: CacheKey,
    id: u64,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        let ours = state
            .jobs
            .get(&self.key)
            .is_some_and(|outstanding| outstanding.id == self.id);
        if ours {
            if let Some(outstanding) = state.jobs.remove(&self.key) {
                state.bytes = state.bytes.saturating_sub(outstanding.charged);
            }
        }
        if state.jobs.is_empty() {
            self.shared.idle.notify_all();
        }
    }
}
