//! rastercache - concurrency substrate for an image transformation service
//!
//! This library lets many concurrent requests share expensive derived
//! artifacts (resized and re-encoded images) without duplicating work,
//! persists them without blocking responses, and records approximate usage
//! statistics under fixed memory bounds.
//!
//! # Components
//!
//! - [`lock`]: per-key mutual exclusion with timeouts
//! - [`writeback`]: bounded write-behind queue with backpressure
//! - [`cache`]: cache keys, results, and the weighted in-memory tier
//! - [`telemetry`]: lock-free Count-Min Sketch percentiles
//! - [`orchestrator`]: the get-or-create entry point composing the above
//!
//! # Example
//!
//! ```
//! use rastercache::cache::CacheKey;
//! use rastercache::config::ConfigFile;
//! use rastercache::orchestrator::CacheOrchestrator;
//! use std::time::{Duration, SystemTime};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! let dir = tempfile::tempdir().unwrap();
//! let mut config = ConfigFile::default();
//! config.store.directory = dir.path().to_path_buf();
//!
//! let orchestrator = CacheOrchestrator::from_config(&config, runtime.handle().clone()).unwrap();
//! let key = CacheKey::new("gallery/sunset.jpg", SystemTime::now());
//! let result = orchestrator
//!     .get_or_create(&key, config.locks.wait_timeout, || Ok::<_, std::io::Error>(vec![0xFF, 0xD8]))
//!     .unwrap();
//! assert_eq!(result.load().unwrap().as_slice(), &[0xFF, 0xD8]);
//! orchestrator.drain(Duration::from_secs(5));
//! ```

pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod lock;
pub mod logging;
pub mod orchestrator;
pub mod telemetry;
pub mod writeback;

/// Version of the rastercache library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
