//! Registry of named sinks.

use crate::telemetry::clamp::ClampingError;
use crate::telemetry::sink::{Sink, SinkProfile};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Pixel count of each processed image.
pub const PIXELS_SINK: &str = "image.pixels";
/// Longest edge of each processed image.
pub const RESOLUTION_SINK: &str = "image.resolution";
/// Latency of each get-or-create call, in microseconds.
pub const GET_OR_CREATE_SINK: &str = "cache.get_or_create";

/// Telemetry query and registration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("unknown telemetry sink '{0}'")]
    UnknownSink(String),

    #[error("telemetry sink '{0}' is already registered")]
    DuplicateSink(String),

    #[error("invalid sink profile: {0}")]
    InvalidProfile(#[from] ClampingError),
}

/// Summary of one sink at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSnapshot {
    pub name: String,
    pub count: u64,
    pub mean: f64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
}

/// Process-lifetime set of named sinks.
///
/// Owned by the service and shared by handle; there is no global instance.
/// Each sink's hash family is derived from the registry seed and the sink
/// name, so the same configuration buckets values identically across
/// restarts.
///
/// # Example
///
/// ```
/// use rastercache::telemetry::{TelemetryRegistry, GET_OR_CREATE_SINK};
/// use std::time::Duration;
///
/// let registry = TelemetryRegistry::with_default_sinks(42);
/// registry.report_duration(GET_OR_CREATE_SINK, Duration::from_millis(12));
/// assert_eq!(registry.percentile(GET_OR_CREATE_SINK, 0.5).unwrap(), 12_000);
/// ```
#[derive(Debug)]
pub struct TelemetryRegistry {
    sinks: DashMap<String, Arc<Sink>>,
    seed: u64,
    dropped: AtomicU64,
}

impl TelemetryRegistry {
    /// Create a registry with no sinks.
    pub fn new(seed: u64) -> Self {
        Self {
            sinks: DashMap::new(),
            seed,
            dropped: AtomicU64::new(0),
        }
    }

    /// Create a registry with the pixel, resolution, and get-or-create
    /// latency sinks registered.
    pub fn with_default_sinks(seed: u64) -> Self {
        let registry = Self::new(seed);
        let defaults = [
            (PIXELS_SINK, SinkProfile::pixels()),
            (RESOLUTION_SINK, SinkProfile::resolution()),
            (GET_OR_CREATE_SINK, SinkProfile::duration_micros()),
        ];
        for (name, profile) in defaults {
            if let Err(err) = profile
                .map_err(TelemetryError::from)
                .and_then(|profile| registry.register(name, profile))
            {
                debug!(sink = name, error = %err, "Default sink not registered");
            }
        }
        registry
    }

    /// Register a new sink under `name`.
    pub fn register(&self, name: &str, profile: SinkProfile) -> Result<Arc<Sink>, TelemetryError> {
        match self.sinks.entry(name.to_string()) {
            Entry::Occupied(_) => Err(TelemetryError::DuplicateSink(name.to_string())),
            Entry::Vacant(slot) => {
                let sink = Arc::new(Sink::new(profile, sink_seed(self.seed, name)));
                slot.insert(Arc::clone(&sink));
                Ok(sink)
            }
        }
    }

    pub fn sink(&self, name: &str) -> Option<Arc<Sink>> {
        self.sinks.get(name).map(|sink| Arc::clone(sink.value()))
    }

    /// Record `value` in the named sink.
    ///
    /// Reports to an unknown sink are dropped and counted.
    pub fn report(&self, name: &str, value: u64) {
        match self.sinks.get(name) {
            Some(sink) => sink.report(value),
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn report_microseconds(&self, name: &str, micros: u64) {
        self.report(name, micros);
    }

    pub fn report_duration(&self, name: &str, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.report_microseconds(name, micros);
    }

    pub fn percentile(&self, name: &str, p: f64) -> Result<u64, TelemetryError> {
        self.with_sink(name, |sink| sink.percentile(p))
    }

    /// Several percentiles from one pass over the sink.
    pub fn percentiles(&self, name: &str, ps: &[f64]) -> Result<Vec<u64>, TelemetryError> {
        self.with_sink(name, |sink| sink.percentiles(ps))
    }

    /// Reports dropped because their sink was not registered.
    pub fn dropped_reports(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Summaries of every sink, sorted by name.
    pub fn snapshot(&self) -> Vec<SinkSnapshot> {
        let mut snapshots: Vec<SinkSnapshot> = self
            .sinks
            .iter()
            .map(|entry| {
                let sink = entry.value();
                let quantiles = sink.percentiles(&[0.5, 0.9, 0.99]);
                SinkSnapshot {
                    name: entry.key().clone(),
                    count: sink.count(),
                    mean: sink.mean(),
                    p50: quantiles[0],
                    p90: quantiles[1],
                    p99: quantiles[2],
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Log one line per sink at info level.
    pub fn log_summary(&self) {
        for snapshot in self.snapshot() {
            info!(
                sink = %snapshot.name,
                count = snapshot.count,
                mean = %format!("{:.1}", snapshot.mean),
                p50 = snapshot.p50,
                p90 = snapshot.p90,
                p99 = snapshot.p99,
                "Telemetry summary"
            );
        }
        let dropped = self.dropped_reports();
        if dropped > 0 {
            info!(dropped, "Telemetry reports to unknown sinks dropped");
        }
    }

    fn with_sink<T>(&self, name: &str, read: impl FnOnce(&Sink) -> T) -> Result<T, TelemetryError> {
        self.sinks
            .get(name)
            .map(|sink| read(sink.value()))
            .ok_or_else(|| TelemetryError::UnknownSink(name.to_string()))
    }
}

/// FNV-1a over the name, mixed with the registry seed. Stable across
/// builds, unlike `DefaultHasher`.
fn sink_seed(seed: u64, name: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let hash = name
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ byte as u64).wrapping_mul(PRIME));
    hash ^ seed.rotate_left(32)
}
