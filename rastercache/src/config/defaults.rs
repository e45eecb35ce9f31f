//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants, default directory helpers, and the
//! `ConfigFile::default()` implementation.

use std::path::PathBuf;
use std::time::Duration;

use super::settings::*;
use crate::cache::MemoryCacheConfig;
use crate::writeback::WriteQueueConfig;

/// Default time a caller waits for another caller producing the same key.
pub const DEFAULT_LOCK_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Default seed for telemetry hash families.
pub const DEFAULT_TELEMETRY_SEED: u64 = 0x5241_5354_4552;

/// Default log file name inside the log directory.
pub const DEFAULT_LOG_FILE: &str = "rastercache.log";

/// Number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Platform cache directory, e.g. `~/.cache/rastercache` on Linux.
pub fn default_store_directory() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rastercache")
}

/// Platform state directory for logs, falling back to the cache directory.
pub fn default_log_directory() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rastercache")
}

/// Directory holding `config.ini`, e.g. `~/.config/rastercache` on Linux.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rastercache")
}

/// Path of the default config file.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(DEFAULT_LOCK_WAIT_TIMEOUT_MS),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: default_store_directory(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            seed: DEFAULT_TELEMETRY_SEED,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            memory_cache: MemoryCacheConfig::default(),
            write_queue: WriteQueueConfig::default()
                .with_max_concurrent_writes(num_cpus().clamp(2, 16)),
            locks: LockConfig::default(),
            store: StoreConfig::default(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
