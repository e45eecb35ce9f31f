//! Background execution substrate for queued writes.
//!
//! [`WriteScheduler`] is the seam between the write queue and whatever runs
//! the jobs. [`TokioScheduler`] runs them on tokio's blocking pool and caps
//! how many may run at once with a semaphore, so a stalled disk produces
//! immediate refusals instead of an unbounded backlog of blocked threads.

use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, TryAcquireError};
use tracing::trace;

/// A unit of background work.
pub type WriteTask = Box<dyn FnOnce() + Send + 'static>;

/// The scheduler refused to take a task.
///
/// A refused task is dropped without running.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// Every worker slot is busy.
    #[error("all {limit} write workers are busy")]
    Saturated { limit: usize },

    /// The scheduler has been shut down.
    #[error("write scheduler is shut down")]
    Closed,
}

/// Runs write tasks off the request path.
pub trait WriteScheduler: Send + Sync {
    /// Hand `task` to a background worker without blocking.
    fn schedule(&self, task: WriteTask) -> Result<(), ScheduleError>;
}

/// Schedules writes onto a tokio runtime's blocking thread pool.
///
/// # Example
///
/// ```
/// use rastercache::writeback::{TokioScheduler, WriteScheduler};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let scheduler = TokioScheduler::new(runtime.handle().clone(), 4);
/// scheduler.schedule(Box::new(|| { /* write bytes */ })).unwrap();
/// ```
pub struct TokioScheduler {
    handle: Handle,
    permits: Arc<Semaphore>,
    limit: usize,
}

impl TokioScheduler {
    /// Create a scheduler allowing `max_concurrent` writes at a time.
    pub fn new(handle: Handle, max_concurrent: usize) -> Self {
        let limit = max_concurrent.max(1);
        Self {
            handle,
            permits: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Create a scheduler on the runtime of the calling context.
    pub fn current(max_concurrent: usize) -> Result<Self, ScheduleError> {
        let handle = Handle::try_current().map_err(|_| ScheduleError::Closed)?;
        Ok(Self::new(handle, max_concurrent))
    }

    /// Refuse all further tasks. Tasks already running are unaffected.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Worker slots currently free.
    pub fn available_slots(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl WriteScheduler for TokioScheduler {
    fn schedule(&self, task: WriteTask) -> Result<(), ScheduleError> {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|err| match err {
                TryAcquireError::NoPermits => ScheduleError::Saturated { limit: self.limit },
                TryAcquireError::Closed => ScheduleError::Closed,
            })?;

        trace!(available = self.permits.available_permits(), "Scheduling background write");

        self.handle.spawn_blocking(move || {
            let _permit = permit;
            task();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_scheduler_runs_task() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TokioScheduler::new(runtime.handle().clone(), 2);
        let (tx, rx) = mpsc::channel();

        scheduler
            .schedule(Box::new(move || tx.send(42).unwrap()))
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_scheduler_refuses_when_saturated() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TokioScheduler::new(runtime.handle().clone(), 1);
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        scheduler
            .schedule(Box::new(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            }))
            .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let refused = scheduler.schedule(Box::new(|| {}));
        assert_eq!(refused, Err(ScheduleError::Saturated { limit: 1 }));

        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_scheduler_refuses_after_close() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TokioScheduler::new(runtime.handle().clone(), 4);
        scheduler.close();

        assert_eq!(scheduler.schedule(Box::new(|| {})), Err(ScheduleError::Closed));
    }

    #[test]
    fn test_current_outside_runtime_fails() {
        assert!(matches!(TokioScheduler::current(4), Err(ScheduleError::Closed)));
    }

    #[test]
    fn test_zero_limit_is_raised_to_one() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let scheduler = TokioScheduler::new(runtime.handle().clone(), 0);
        assert_eq!(scheduler.limit(), 1);
        assert_eq!(scheduler.available_slots(), 1);
    }
}
