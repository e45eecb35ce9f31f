//! No-op diagnostics implementation.

use crate::cache::CacheKey;
use crate::diagnostics::Diagnostics;
use crate::orchestrator::StoreError;
use crate::writeback::WriterFailure;

/// Diagnostics sink that discards everything.
///
/// Useful in tests and for embedders that collect failures through the
/// statistics counters alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpDiagnostics;

impl Diagnostics for NoOpDiagnostics {
    fn writer_failed(&self, _key: &CacheKey, _failure: &WriterFailure) {}

    fn sync_write_failed(&self, _key: &CacheKey, _error: &StoreError) {}
}
