//! Core types shared by the cache tiers.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Cache key uniquely identifying one derived artifact.
///
/// Combines the normalized relative path of the request with the source
/// file's last-modified timestamp. Paths compare case-insensitively; two
/// keys are equal only when both the path and the timestamp match exactly,
/// so a source edit yields a new key and the old artifact goes stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    relative_path: String,
    modified: SystemTime,
}

impl CacheKey {
    /// Create a new cache key.
    ///
    /// The path is lowercased, backslashes become forward slashes, and
    /// empty or `.` segments are dropped.
    pub fn new(relative_path: impl AsRef<str>, modified: SystemTime) -> Self {
        Self {
            relative_path: normalize_path(relative_path.as_ref()),
            modified,
        }
    }

    /// Normalized relative path.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Source last-modified timestamp.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Source timestamp as signed nanoseconds relative to the Unix epoch.
    ///
    /// Earlier times are negative, so distinct timestamps never share a
    /// lock name or store path.
    pub fn modified_nanos(&self) -> i128 {
        match self.modified.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_nanos() as i128,
            Err(before) => -(before.duration().as_nanos() as i128),
        }
    }

    /// String form used for per-key locking.
    pub fn lock_key(&self) -> String {
        format!("{}|{}", self.relative_path, self.modified_nanos())
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.relative_path, self.modified_nanos())
    }
}

fn normalize_path(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
        .to_lowercase()
}

/// How a get-or-create call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOutcome {
    /// Served from an existing artifact (on disk or still in the write queue).
    Hit,
    /// Produced by this call.
    Miss,
    /// Neither served nor produced; the per-key lock timed out.
    Failed,
}

/// Result of a single get-or-create call. Immutable once built.
#[derive(Debug, Clone)]
pub struct CacheResult {
    outcome: CacheOutcome,
    physical_path: Option<PathBuf>,
    data: Option<Arc<Vec<u8>>>,
}

impl CacheResult {
    /// Hit on an artifact already persisted at `path`.
    pub fn hit_on_disk(path: PathBuf) -> Self {
        Self {
            outcome: CacheOutcome::Hit,
            physical_path: Some(path),
            data: None,
        }
    }

    /// Hit on an artifact whose bytes are still held in memory.
    pub fn hit_in_memory(data: Arc<Vec<u8>>, path: Option<PathBuf>) -> Self {
        Self {
            outcome: CacheOutcome::Hit,
            physical_path: path,
            data: Some(data),
        }
    }

    /// Miss: the bytes were just produced. `path` is where they are (or will be) persisted.
    pub fn miss(data: Arc<Vec<u8>>, path: Option<PathBuf>) -> Self {
        Self {
            outcome: CacheOutcome::Miss,
            physical_path: path,
            data: Some(data),
        }
    }

    /// The call could not complete.
    pub fn failed() -> Self {
        Self {
            outcome: CacheOutcome::Failed,
            physical_path: None,
            data: None,
        }
    }

    pub fn outcome(&self) -> CacheOutcome {
        self.outcome
    }

    pub fn physical_path(&self) -> Option<&Path> {
        self.physical_path.as_deref()
    }

    /// In-memory bytes, when the result carries them.
    pub fn data(&self) -> Option<&Arc<Vec<u8>>> {
        self.data.as_ref()
    }

    pub fn is_hit(&self) -> bool {
        self.outcome == CacheOutcome::Hit
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == CacheOutcome::Failed
    }

    /// Returns the artifact bytes, reading the physical file when the
    /// result does not carry them in memory.
    pub fn load(&self) -> io::Result<Arc<Vec<u8>>> {
        if let Some(data) = &self.data {
            return Ok(Arc::clone(data));
        }
        match &self.physical_path {
            Some(path) => fs::read(path).map(Arc::new),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                "cache result carries no artifact",
            )),
        }
    }
}

/// Weighted memory cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCacheConfig {
    /// Ceiling on the summed weight of all entries (default: 256 MB)
    pub max_weight_bytes: u64,
    /// Entries unused for this long become eviction-eligible (default: 10 minutes)
    pub sliding_expiration: Duration,
    /// Minimum spacing between routine cleanup passes (default: 30 seconds)
    pub min_cleanup_interval: Duration,
    /// Fixed bookkeeping cost charged per entry (default: 128 bytes)
    pub entry_overhead_bytes: u64,
    /// Weight charged per byte of key (default: 2)
    pub key_byte_weight: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_weight_bytes: 256 * 1024 * 1024,
            sliding_expiration: Duration::from_secs(600),
            min_cleanup_interval: Duration::from_secs(30),
            entry_overhead_bytes: 128,
            key_byte_weight: 2,
        }
    }
}

impl MemoryCacheConfig {
    /// Create a configuration with the given weight ceiling and default timings.
    pub fn new(max_weight_bytes: u64) -> Self {
        Self {
            max_weight_bytes,
            ..Self::default()
        }
    }

    pub fn with_sliding_expiration(mut self, window: Duration) -> Self {
        self.sliding_expiration = window;
        self
    }

    pub fn with_min_cleanup_interval(mut self, interval: Duration) -> Self {
        self.min_cleanup_interval = interval;
        self
    }

    pub fn with_entry_overhead(mut self, bytes: u64) -> Self {
        self.entry_overhead_bytes = bytes;
        self
    }

    pub fn with_key_byte_weight(mut self, weight: u64) -> Self {
        self.key_byte_weight = weight;
        self
    }
}
