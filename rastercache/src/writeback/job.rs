//! Background write job.

use crate::cache::CacheKey;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A produced artifact waiting to be persisted.
///
/// The buffer is shared read-only with the response path; the queue owns the
/// job itself from admission until the write finishes.
#[derive(Debug, Clone)]
pub struct AsyncWriteJob {
    key: CacheKey,
    buffer: Arc<Vec<u8>>,
    enqueued_at: Instant,
}

impl AsyncWriteJob {
    /// Create a job stamped with the current time.
    pub fn new(key: CacheKey, buffer: Arc<Vec<u8>>) -> Self {
        Self {
            key,
            buffer,
            enqueued_at: Instant::now(),
        }
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Shared handle to the artifact bytes.
    pub fn buffer(&self) -> &Arc<Vec<u8>> {
        &self.buffer
    }

    /// Artifact bytes.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    /// Bytes charged against the queue budget.
    ///
    /// Uses the buffer's allocated capacity rather than its length so the
    /// budget reflects the memory actually kept alive.
    pub fn charged_bytes(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Time since the job was created.
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}
