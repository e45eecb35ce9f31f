//! Get-or-create orchestration over the lock, write queue, and artifact store.
//!
//! [`CacheOrchestrator`] is the entry point the image pipeline calls. It
//! composes a [`crate::lock::KeyedMutex`] so one caller per key produces,
//! a [`crate::writeback::BoundedAsyncWriteQueue`] so responses never wait on
//! disk, and an [`ArtifactStore`] that owns the on-disk layout.
//!
//! # Example
//!
//! ```
//! use rastercache::cache::{CacheKey, CacheOutcome};
//! use rastercache::diagnostics::NoOpDiagnostics;
//! use rastercache::orchestrator::{CacheOrchestrator, DirectoryStore};
//! use rastercache::writeback::{BoundedAsyncWriteQueue, TokioScheduler};
//! use std::sync::Arc;
//! use std::time::{Duration, SystemTime};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let dir = tempfile::tempdir().unwrap();
//! let orchestrator = CacheOrchestrator::new(
//!     Arc::new(DirectoryStore::new(dir.path()).unwrap()),
//!     BoundedAsyncWriteQueue::new(
//!         64 * 1024 * 1024,
//!         Arc::new(TokioScheduler::new(runtime.handle().clone(), 4)),
//!         Arc::new(NoOpDiagnostics),
//!     ),
//!     Arc::new(NoOpDiagnostics),
//! );
//!
//! let key = CacheKey::new("photos/cat.jpg", SystemTime::now());
//! let result = orchestrator
//!     .get_or_create(&key, Duration::from_secs(5), || Ok::<_, std::io::Error>(vec![0u8; 16]))
//!     .unwrap();
//! assert_eq!(result.outcome(), CacheOutcome::Miss);
//! ```

mod service;
mod stats;
mod store;

pub use service::CacheOrchestrator;
pub use stats::OrchestratorStats;
pub use store::{ArtifactStore, DirectoryStore, StoreError};
