//! Read-through, write-behind get-or-create.

use crate::cache::{CacheKey, CacheOutcome, CacheResult};
use crate::config::ConfigFile;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::lock::KeyedMutex;
use crate::orchestrator::stats::{OrchestratorCounters, OrchestratorStats};
use crate::orchestrator::store::{ArtifactStore, DirectoryStore, StoreError};
use crate::telemetry::{TelemetryRegistry, GET_OR_CREATE_SINK};
use crate::writeback::{AsyncWriteJob, BoundedAsyncWriteQueue, QueueRejected, TokioScheduler};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// Shares expensive derived artifacts between concurrent requests.
///
/// A request is served, in order of preference, from:
///
/// 1. a write still in flight in the write queue (memory hit),
/// 2. the artifact store (disk hit),
/// 3. the producer, run by exactly one caller per key while the others wait
///    on the per-key lock and then find the artifact in step 1 or 2.
///
/// Freshly produced bytes go back to the caller immediately and are handed
/// to the write queue for persistence. When the queue refuses them the
/// write happens synchronously on the calling thread.
pub struct CacheOrchestrator {
    store: Arc<dyn ArtifactStore>,
    locks: KeyedMutex,
    write_queue: BoundedAsyncWriteQueue,
    telemetry: Option<Arc<TelemetryRegistry>>,
    diagnostics: Arc<dyn Diagnostics>,
    counters: OrchestratorCounters,
}

impl CacheOrchestrator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        write_queue: BoundedAsyncWriteQueue,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            store,
            locks: KeyedMutex::new(),
            write_queue,
            telemetry: None,
            diagnostics,
            counters: OrchestratorCounters::default(),
        }
    }

    /// Report every call's latency to `registry`.
    pub fn with_telemetry(mut self, registry: Arc<TelemetryRegistry>) -> Self {
        self.telemetry = Some(registry);
        self
    }

    /// Wire up a directory store, tokio-backed write queue, and tracing
    /// diagnostics from configuration.
    ///
    /// Background writes run on `handle`'s blocking pool.
    pub fn from_config(config: &ConfigFile, handle: Handle) -> Result<Self, StoreError> {
        let store = Arc::new(DirectoryStore::new(&config.store.directory)?);
        let diagnostics: Arc<dyn Diagnostics> = Arc::new(TracingDiagnostics::new());
        let scheduler = Arc::new(TokioScheduler::new(
            handle,
            config.write_queue.max_concurrent_writes,
        ));
        let queue = BoundedAsyncWriteQueue::new(
            config.write_queue.max_queue_bytes,
            scheduler,
            Arc::clone(&diagnostics),
        );

        let mut orchestrator = Self::new(store, queue, diagnostics);
        if config.telemetry.enabled {
            orchestrator = orchestrator.with_telemetry(Arc::new(
                TelemetryRegistry::with_default_sinks(config.telemetry.seed),
            ));
        }
        Ok(orchestrator)
    }

    /// Return the artifact for `key`, producing it on a miss.
    ///
    /// Waits at most `timeout` for another caller producing the same key;
    /// if the wait times out the result is [`CacheOutcome::Failed`] and
    /// `produce` is not called. An error from `produce` is returned as-is
    /// and nothing is cached.
    pub fn get_or_create<F, E>(
        &self,
        key: &CacheKey,
        timeout: Duration,
        produce: F,
    ) -> Result<CacheResult, E>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        let started = Instant::now();
        let result = self.resolve(key, timeout, produce);

        match &result {
            Ok(found) if found.outcome() == CacheOutcome::Failed => self.counters.record_failure(),
            Ok(found) if found.outcome() == CacheOutcome::Miss => self.counters.record_miss(),
            Ok(_) => {}
            Err(_) => self.counters.record_produce_error(),
        }
        if let Some(telemetry) = &self.telemetry {
            telemetry.report_duration(GET_OR_CREATE_SINK, started.elapsed());
        }

        result
    }

    fn resolve<F, E>(&self, key: &CacheKey, timeout: Duration, produce: F) -> Result<CacheResult, E>
    where
        F: FnOnce() -> Result<Vec<u8>, E>,
    {
        if let Some(found) = self.lookup(key) {
            return Ok(found);
        }

        let attempt = self.locks.try_execute(&key.lock_key(), timeout, || {
            // Another caller may have produced it while we waited.
            if let Some(found) = self.lookup(key) {
                return Ok(found);
            }

            let data = Arc::new(produce()?);
            let path = self.persist(key, &data);
            debug!(key = %key, bytes = data.len(), "Artifact produced");
            Ok(CacheResult::miss(data, path))
        });

        match attempt {
            Ok(result) => result,
            Err(err) => {
                warn!(key = %key, timeout_ms = err.timeout.as_millis() as u64, "Timed out waiting for artifact lock");
                Ok(CacheResult::failed())
            }
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<CacheResult> {
        if let Some(data) = self.write_queue.get(key) {
            self.counters.record_memory_hit();
            let path = self.store.path_for(key).ok();
            return Some(CacheResult::hit_in_memory(data, path));
        }
        let path = self.store.locate(key)?;
        self.counters.record_disk_hit();
        Some(CacheResult::hit_on_disk(path))
    }

    /// Hand `data` to the write queue, falling back to a synchronous write.
    ///
    /// Returns where the artifact will live, or `None` when it could not be
    /// persisted at all.
    fn persist(&self, key: &CacheKey, data: &Arc<Vec<u8>>) -> Option<PathBuf> {
        let path = match self.store.path_for(key) {
            Ok(path) => path,
            Err(err) => {
                self.counters.record_sync_write_failure();
                self.diagnostics.sync_write_failed(key, &err);
                return None;
            }
        };

        let store = Arc::clone(&self.store);
        let job = AsyncWriteJob::new(key.clone(), Arc::clone(data));
        let rejection = match self
            .write_queue
            .queue(job, move |job| store.write(job.key(), job.data()))
        {
            Ok(()) => {
                self.counters.record_queued_write();
                return Some(path);
            }
            Err(rejection) => rejection,
        };

        // First writer wins: the outstanding job owns the file.
        if rejection == QueueRejected::Duplicate {
            self.counters.record_deferred_write();
            debug!(key = %key, "Write already in flight - serving produced bytes without persisting");
            return Some(path);
        }

        debug!(key = %key, reason = %rejection, "Write queue refused job - writing synchronously");
        match self.store.write(key, data) {
            Ok(()) => {
                self.counters.record_sync_write();
                Some(path)
            }
            Err(err) => {
                self.counters.record_sync_write_failure();
                self.diagnostics.sync_write_failed(key, &err);
                None
            }
        }
    }

    pub fn write_queue(&self) -> &BoundedAsyncWriteQueue {
        &self.write_queue
    }

    pub fn telemetry(&self) -> Option<&Arc<TelemetryRegistry>> {
        self.telemetry.as_ref()
    }

    /// Wait for outstanding background writes. Returns `true` once idle.
    pub fn drain(&self, timeout: Duration) -> bool {
        self.write_queue.drain(timeout)
    }

    pub fn stats(&self) -> OrchestratorStats {
        self.counters.snapshot()
    }

    /// Log orchestrator and write queue statistics at info level.
    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            requests = stats.requests(),
            memory_hits = stats.memory_hits,
            disk_hits = stats.disk_hits,
            misses = stats.misses,
            failures = stats.failures,
            produce_errors = stats.produce_errors,
            hit_rate = %format!("{:.1}%", stats.hit_rate() * 100.0),
            sync_writes = stats.sync_writes,
            sync_write_failures = stats.sync_write_failures,
            locks_contended = self.locks.contended(),
            lock_timeouts = self.locks.timeouts(),
            "Cache orchestrator statistics"
        );
        self.write_queue.log_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoOpDiagnostics;
    use crate::writeback::{ScheduleError, WriteScheduler, WriteTask};
    use parking_lot::Mutex;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::UNIX_EPOCH;
    use tempfile::TempDir;

    /// Runs each task on the calling thread.
    struct InlineScheduler;

    impl WriteScheduler for InlineScheduler {
        fn schedule(&self, task: WriteTask) -> Result<(), ScheduleError> {
            task();
            Ok(())
        }
    }

    /// Holds tasks until the test runs them.
    #[derive(Default)]
    struct HeldScheduler {
        tasks: Mutex<Vec<WriteTask>>,
    }

    impl HeldScheduler {
        fn run_all(&self) {
            let tasks: Vec<WriteTask> = self.tasks.lock().drain(..).collect();
            for task in tasks {
                task();
            }
        }
    }

    impl WriteScheduler for HeldScheduler {
        fn schedule(&self, task: WriteTask) -> Result<(), ScheduleError> {
            self.tasks.lock().push(task);
            Ok(())
        }
    }

    struct RefusingScheduler;

    impl WriteScheduler for RefusingScheduler {
        fn schedule(&self, _task: WriteTask) -> Result<(), ScheduleError> {
            Err(ScheduleError::Closed)
        }
    }

    fn key(path: &str) -> CacheKey {
        CacheKey::new(path, UNIX_EPOCH + Duration::from_secs(1_700_000_000))
    }

    fn orchestrator(dir: &TempDir, scheduler: Arc<dyn WriteScheduler>) -> CacheOrchestrator {
        let store = Arc::new(DirectoryStore::new(dir.path()).unwrap());
        let queue = BoundedAsyncWriteQueue::new(1 << 20, scheduler, Arc::new(NoOpDiagnostics));
        CacheOrchestrator::new(store, queue, Arc::new(NoOpDiagnostics))
    }

    fn produce_ok() -> Result<Vec<u8>, io::Error> {
        Ok(b"resized".to_vec())
    }

    #[test]
    fn test_miss_then_disk_hit() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, Arc::new(InlineScheduler));

        let first = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), produce_ok)
            .unwrap();
        assert_eq!(first.outcome(), CacheOutcome::Miss);
        assert_eq!(first.data().unwrap().as_slice(), b"resized");

        let second = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), || -> Result<Vec<u8>, io::Error> {
                panic!("must not produce on a hit")
            })
            .unwrap();
        assert_eq!(second.outcome(), CacheOutcome::Hit);
        assert!(second.data().is_none());
        assert_eq!(second.load().unwrap().as_slice(), b"resized");
        assert_eq!(second.physical_path(), first.physical_path());
    }

    #[test]
    fn test_hit_served_from_in_flight_write() {
        let dir = TempDir::new().unwrap();
        let scheduler = Arc::new(HeldScheduler::default());
        let orchestrator = orchestrator(&dir, Arc::clone(&scheduler) as Arc<dyn WriteScheduler>);

        orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), produce_ok)
            .unwrap();
        let pending = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), produce_ok)
            .unwrap();

        assert_eq!(pending.outcome(), CacheOutcome::Hit);
        assert_eq!(pending.data().unwrap().as_slice(), b"resized");
        assert_eq!(orchestrator.stats().memory_hits, 1);

        scheduler.run_all();
        assert!(orchestrator.drain(Duration::from_millis(10)));
        let persisted = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), produce_ok)
            .unwrap();
        assert_eq!(orchestrator.stats().disk_hits, 1);
        assert!(persisted.physical_path().unwrap().is_file());
    }

    #[test]
    fn test_rejected_queue_falls_back_to_sync_write() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, Arc::new(RefusingScheduler));

        let result = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), produce_ok)
            .unwrap();

        assert_eq!(result.outcome(), CacheOutcome::Miss);
        assert!(result.physical_path().unwrap().is_file());
        assert_eq!(orchestrator.stats().sync_writes, 1);
        assert_eq!(orchestrator.stats().queued_writes, 0);
    }

    #[test]
    fn test_producer_error_propagates_and_caches_nothing() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, Arc::new(InlineScheduler));

        let err = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), || {
                Err(io::Error::other("decode failed"))
            })
            .unwrap_err();
        assert_eq!(err.to_string(), "decode failed");
        assert_eq!(orchestrator.stats().produce_errors, 1);

        let calls = AtomicUsize::new(0);
        let retry = orchestrator
            .get_or_create(&key("a.jpg"), Duration::from_secs(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                produce_ok()
            })
            .unwrap();
        assert_eq!(retry.outcome(), CacheOutcome::Miss);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lock_timeout_yields_failed() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, Arc::new(InlineScheduler));
        let k = key("slow.jpg");

        let _held = orchestrator.locks.lock(&k.lock_key(), Duration::from_secs(1)).unwrap();
        let result = orchestrator
            .get_or_create(&k, Duration::from_millis(20), || -> Result<Vec<u8>, io::Error> {
                panic!("must not produce without the lock")
            })
            .unwrap();

        assert!(result.is_failed());
        assert!(result.physical_path().is_none());
        assert_eq!(orchestrator.stats().failures, 1);
    }

    #[test]
    fn test_unstorable_key_still_served() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(&dir, Arc::new(InlineScheduler));

        let result = orchestrator
            .get_or_create(&key("../outside.jpg"), Duration::from_secs(1), produce_ok)
            .unwrap();

        assert_eq!(result.outcome(), CacheOutcome::Miss);
        assert!(result.physical_path().is_none());
        assert_eq!(result.load().unwrap().as_slice(), b"resized");
        assert_eq!(orchestrator.stats().sync_write_failures, 1);
    }

    #[test]
    fn test_latency_reported_to_telemetry() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(TelemetryRegistry::with_default_sinks(7));
        let orchestrator =
            orchestrator(&dir, Arc::new(InlineScheduler)).with_telemetry(Arc::clone(&registry));

        for _ in 0..3 {
            orchestrator
                .get_or_create(&key("a.jpg"), Duration::from_secs(1), produce_ok)
                .unwrap();
        }

        assert_eq!(registry.sink(GET_OR_CREATE_SINK).unwrap().count(), 3);
    }
}
