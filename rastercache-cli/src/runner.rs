//! CLI runner for common setup.
//!
//! Loads configuration and initializes logging so command handlers start
//! from a ready environment.

use crate::error::CliError;
use rastercache::config::ConfigFile;
use rastercache::logging::{init_logging, LoggingGuard};
use std::path::Path;
use tracing::info;

/// Runner that manages CLI lifecycle.
pub struct CliRunner {
    /// Keeps the log writer alive while the runner exists
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load configuration (default path unless `config_path` is given) and
    /// start logging to the configured file, mirrored to stderr when
    /// `verbose` is set.
    pub fn new(config_path: Option<&Path>, verbose: bool) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file, verbose)
            .map_err(CliError::LoggingInit)?;

        info!(
            version = rastercache::VERSION,
            log = %logging_guard.log_path().display(),
            "rastercache starting"
        );

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }
}
