//! Write queue configuration.

/// Default ceiling on buffered bytes awaiting persistence (100 MB).
pub const DEFAULT_MAX_QUEUE_BYTES: usize = 100 * 1024 * 1024;

/// Default number of background writes allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 8;

/// Configuration for [`super::BoundedAsyncWriteQueue`] and its scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteQueueConfig {
    /// Maximum summed buffer capacity of outstanding jobs.
    pub max_queue_bytes: usize,
    /// Maximum concurrently running background writes.
    pub max_concurrent_writes: usize,
}

impl Default for WriteQueueConfig {
    fn default() -> Self {
        Self {
            max_queue_bytes: DEFAULT_MAX_QUEUE_BYTES,
            max_concurrent_writes: DEFAULT_MAX_CONCURRENT_WRITES,
        }
    }
}

impl WriteQueueConfig {
    pub fn with_max_queue_bytes(mut self, bytes: usize) -> Self {
        self.max_queue_bytes = bytes;
        self
    }

    pub fn with_max_concurrent_writes(mut self, writes: usize) -> Self {
        self.max_concurrent_writes = writes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_queue_config_default() {
        let config = WriteQueueConfig::default();
        assert_eq!(config.max_queue_bytes, 100 * 1024 * 1024);
        assert_eq!(config.max_concurrent_writes, 8);
    }

    #[test]
    fn test_write_queue_config_builder() {
        let config = WriteQueueConfig::default()
            .with_max_queue_bytes(4096)
            .with_max_concurrent_writes(2);
        assert_eq!(config.max_queue_bytes, 4096);
        assert_eq!(config.max_concurrent_writes, 2);
    }
}
