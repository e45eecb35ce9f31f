//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

const SIZE_HINT: &str = "expected format like '256MB', '2GB', or '1024KB'";

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [memory_cache] section
    if let Some(section) = ini.section(Some("memory_cache")) {
        let s = Section::new("memory_cache", section);
        if let Some(bytes) = s.size("max_size")? {
            config.memory_cache.max_weight_bytes = bytes as u64;
        }
        if let Some(secs) = s.number::<u64>("sliding_expiration_secs", "must be a positive integer (seconds)")? {
            config.memory_cache.sliding_expiration = Duration::from_secs(secs);
        }
        if let Some(secs) = s.number::<u64>("cleanup_interval_secs", "must be a positive integer (seconds)")? {
            config.memory_cache.min_cleanup_interval = Duration::from_secs(secs);
        }
        if let Some(bytes) = s.number::<u64>("entry_overhead_bytes", "must be a non-negative integer")? {
            config.memory_cache.entry_overhead_bytes = bytes;
        }
        if let Some(weight) = s.number::<u64>("key_byte_weight", "must be a non-negative integer")? {
            config.memory_cache.key_byte_weight = weight;
        }
    }

    // [write_queue] section
    if let Some(section) = ini.section(Some("write_queue")) {
        let s = Section::new("write_queue", section);
        if let Some(bytes) = s.size("max_size")? {
            config.write_queue.max_queue_bytes = bytes;
        }
        if let Some(writes) = s.number::<usize>("max_concurrent_writes", "must be a positive integer")? {
            if writes == 0 {
                return Err(s.invalid("max_concurrent_writes", "0", "must be at least 1"));
            }
            config.write_queue.max_concurrent_writes = writes;
        }
    }

    // [locks] section
    if let Some(section) = ini.section(Some("locks")) {
        let s = Section::new("locks", section);
        if let Some(ms) = s.number::<u64>("wait_timeout_ms", "must be a non-negative integer (milliseconds)")? {
            config.locks.wait_timeout = Duration::from_millis(ms);
        }
    }

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.directory = expand_tilde(v);
            }
        }
    }

    // [telemetry] section
    if let Some(section) = ini.section(Some("telemetry")) {
        let s = Section::new("telemetry", section);
        if let Some(v) = section.get("enabled") {
            config.telemetry.enabled = parse_bool(v)
                .ok_or_else(|| s.invalid("enabled", v, "must be true or false"))?;
        }
        if let Some(seed) = s.number::<u64>("seed", "must be a non-negative integer")? {
            config.telemetry.seed = seed;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// One INI section plus its name, for error reporting.
struct Section<'a> {
    name: &'static str,
    props: &'a Properties,
}

impl<'a> Section<'a> {
    fn new(name: &'static str, props: &'a Properties) -> Self {
        Self { name, props }
    }

    fn invalid(&self, key: &str, value: &str, reason: &str) -> ConfigFileError {
        ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    fn size(&self, key: &str) -> Result<Option<usize>, ConfigFileError> {
        match self.props.get(key) {
            None => Ok(None),
            Some(v) => parse_size(v)
                .map(Some)
                .map_err(|_| self.invalid(key, v, SIZE_HINT)),
        }
    }

    fn number<T: FromStr>(&self, key: &str, reason: &str) -> Result<Option<T>, ConfigFileError> {
        match self.props.get(key) {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(key, v, reason)),
        }
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
