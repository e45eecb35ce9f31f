//! Write-behind persistence with backpressure.
//!
//! A cache miss hands its freshly produced bytes to the
//! [`BoundedAsyncWriteQueue`] and returns to the caller immediately; a
//! background worker persists them. The queue is the service's memory valve:
//! it refuses duplicates, refuses jobs that would push buffered bytes over
//! budget, and refuses when the scheduler has no worker to spare. Every
//! refusal tells the caller to fall back to writing synchronously.
//!
//! ```text
//! miss ──► queue() ──┬─► Err(Duplicate | OverBudget | SchedulingFailed) ──► sync write
//!                    │
//!                    └─► Ok ──► WriteScheduler ──► writer(job) ──► index entry removed
//!                                                   │
//!                                                   └─ Err/panic ──► Diagnostics
//! ```

mod config;
mod job;
mod queue;
mod scheduler;
mod stats;

pub use config::WriteQueueConfig;
pub use job::AsyncWriteJob;
pub use queue::{BoundedAsyncWriteQueue, QueueRejected, WriterFailure};
pub use scheduler::{ScheduleError, TokioScheduler, WriteScheduler, WriteTask};
pub use stats::WriteQueueStats;
