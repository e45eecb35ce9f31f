//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! Produces the commented representation written by `ConfigFile::save_to`
//! and printed by `rastercache config`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let memory = &config.memory_cache;
    let queue = &config.write_queue;

    format!(
        r#"[memory_cache]
; Ceiling on the summed weight of in-memory entries (default: 256MB)
; Supports: B, KB, MB, GB, TB suffixes
max_size = {}
; Entries unused for this long are dropped even under the ceiling
sliding_expiration_secs = {}
; Minimum time between routine cleanup passes
cleanup_interval_secs = {}
; Fixed weight charged per entry on top of key and payload
entry_overhead_bytes = {}
; Weight charged per byte of an entry's key
key_byte_weight = {}

[write_queue]
; Ceiling on buffered bytes awaiting background persistence (default: 100MB)
; Jobs beyond this are written synchronously on the request thread
max_size = {}
; Background writes allowed to run at once
max_concurrent_writes = {}

[locks]
; How long a request waits for another request producing the same artifact
wait_timeout_ms = {}

[store]
; Root directory for persisted artifacts
; If empty, defaults to the platform cache directory
directory = {}

[telemetry]
enabled = {}
; Hash seed for telemetry sketches; keep fixed so buckets are stable
seed = {}

[logging]
directory = {}
file = {}
"#,
        format_size(memory.max_weight_bytes as usize),
        memory.sliding_expiration.as_secs(),
        memory.min_cleanup_interval.as_secs(),
        memory.entry_overhead_bytes,
        memory.key_byte_weight,
        format_size(queue.max_queue_bytes),
        queue.max_concurrent_writes,
        config.locks.wait_timeout.as_millis(),
        path_to_string(&config.store.directory),
        config.telemetry.enabled,
        config.telemetry.seed,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
