//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file. The memory
//! cache and write queue sections reuse the component configs directly.
//! These are pure data types with no parsing or serialization logic.

use crate::cache::MemoryCacheConfig;
use crate::writeback::WriteQueueConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    /// `[memory_cache]`
    pub memory_cache: MemoryCacheConfig,
    /// `[write_queue]`
    pub write_queue: WriteQueueConfig,
    /// `[locks]`
    pub locks: LockConfig,
    /// `[store]`
    pub store: StoreConfig,
    /// `[telemetry]`
    pub telemetry: TelemetryConfig,
    /// `[logging]`
    pub logging: LoggingConfig,
}

/// Per-key lock settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockConfig {
    /// How long a caller waits for another caller producing the same key.
    pub wait_timeout: Duration,
}

/// Artifact store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root directory for persisted artifacts.
    pub directory: PathBuf,
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Seed for sketch hash families. Keep it fixed so buckets are stable
    /// across restarts.
    pub seed: u64,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file: String,
}
