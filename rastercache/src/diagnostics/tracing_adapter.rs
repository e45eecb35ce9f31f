//! Tracing library adapter implementation.

use crate::cache::CacheKey;
use crate::diagnostics::Diagnostics;
use crate::orchestrator::StoreError;
use crate::writeback::WriterFailure;
use tracing::{error, warn};

/// Diagnostics implementation that emits `tracing` events.
///
/// Assumes a subscriber is installed (see [`crate::logging::init_logging`]);
/// without one the events are dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    pub fn new() -> Self {
        Self
    }
}

impl Diagnostics for TracingDiagnostics {
    fn writer_failed(&self, key: &CacheKey, failure: &WriterFailure) {
        match failure {
            WriterFailure::Panicked(_) => error!(
                key = %key,
                error = %failure,
                "Background cache write panicked - job discarded"
            ),
            WriterFailure::Returned(_) => warn!(
                key = %key,
                error = %failure,
                "Background cache write failed - job discarded"
            ),
        }
    }

    fn sync_write_failed(&self, key: &CacheKey, error: &StoreError) {
        warn!(
            key = %key,
            error = %error,
            "Synchronous cache write failed - served from memory only"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::UNIX_EPOCH;

    #[test]
    fn test_tracing_diagnostics_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TracingDiagnostics>();
    }

    #[test]
    fn test_tracing_diagnostics_accepts_all_failures() {
        let diagnostics = TracingDiagnostics::new();
        let key = CacheKey::new("a.png", UNIX_EPOCH);

        diagnostics.writer_failed(&key, &WriterFailure::Returned("disk full".to_string()));
        diagnostics.writer_failed(&key, &WriterFailure::Panicked("boom".to_string()));
        diagnostics.sync_write_failed(&key, &StoreError::InvalidPath("../x".to_string()));
    }
}
