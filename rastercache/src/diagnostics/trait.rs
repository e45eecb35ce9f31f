//! Diagnostics trait definition.

use crate::cache::CacheKey;
use crate::orchestrator::StoreError;
use crate::writeback::WriterFailure;

/// Receives failures that are swallowed at a component boundary.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; they are called from background
/// write workers and request threads alike.
///
/// # Example
///
/// ```
/// use rastercache::diagnostics::{Diagnostics, NoOpDiagnostics};
/// use std::sync::Arc;
///
/// let diagnostics: Arc<dyn Diagnostics> = Arc::new(NoOpDiagnostics);
/// ```
pub trait Diagnostics: Send + Sync {
    /// A queued background write failed or panicked; the job was discarded.
    fn writer_failed(&self, key: &CacheKey, failure: &WriterFailure);

    /// A synchronous fallback write failed; the response was still served.
    fn sync_write_failed(&self, key: &CacheKey, error: &StoreError);
}
