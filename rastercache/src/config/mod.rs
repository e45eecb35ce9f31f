//! Configuration for rastercache components.
//!
//! [`ConfigFile`] groups one settings struct per concern and is loaded from
//! an INI file. Component configs such as [`crate::cache::MemoryCacheConfig`]
//! and [`crate::writeback::WriteQueueConfig`] double as sections, so code
//! that builds components by hand uses the same types and builders.
//!
//! # Example
//!
//! ```
//! use rastercache::config::ConfigFile;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let config = ConfigFile::load_from(&dir.path().join("missing.ini")).unwrap();
//! assert_eq!(config, ConfigFile::default());
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{
    config_directory, config_file_path, default_log_directory, default_store_directory,
    DEFAULT_LOCK_WAIT_TIMEOUT_MS, DEFAULT_LOG_FILE, DEFAULT_TELEMETRY_SEED,
};
pub use file::ConfigFileError;
pub use settings::{ConfigFile, LockConfig, LoggingConfig, StoreConfig, TelemetryConfig};
pub use size::{format_size, parse_size, SizeParseError};
