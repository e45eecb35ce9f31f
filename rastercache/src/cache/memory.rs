//! Weighted in-memory cache with sliding expiration.
//!
//! Every entry is charged a weight of
//! `entry_overhead + key_len * key_byte_weight + payload_bytes`. Two soft
//! limits are enforced by cleanup passes:
//!
//! - the summed weight stays at or below `max_weight_bytes`, evicting the
//!   least recently used entries first;
//! - entries not touched within the sliding window are dropped even when the
//!   cache is under its ceiling.
//!
//! Routine passes run at most once per `min_cleanup_interval`. An insert that
//! pushes the total over the ceiling forces an immediate pass.
//!
//! Lookups and inserts go through a sharded `DashMap`; a cleanup pass walks
//! the map once while holding the cleanup lock, so concurrent passes never
//! pile up. Losing a race to evict or overwrite an entry is harmless.

use crate::cache::stats::{MemoryCacheCounters, MemoryCacheStats};
use crate::cache::types::MemoryCacheConfig;
use crate::lock::KeyedMutex;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Payload size of a cached value, used for weighting.
pub trait Weighted {
    /// Bytes of memory the value keeps alive.
    fn payload_bytes(&self) -> usize;
}

impl Weighted for Vec<u8> {
    fn payload_bytes(&self) -> usize {
        self.capacity()
    }
}

impl Weighted for Arc<Vec<u8>> {
    fn payload_bytes(&self) -> usize {
        self.capacity()
    }
}

impl Weighted for Arc<[u8]> {
    fn payload_bytes(&self) -> usize {
        self.len()
    }
}

impl Weighted for String {
    fn payload_bytes(&self) -> usize {
        self.capacity()
    }
}

/// Entry in the weighted cache.
struct CacheEntry<V> {
    value: V,
    weight: u64,
    /// Nanoseconds since the cache epoch of the last get or set.
    last_accessed: AtomicU64,
    /// Distinguishes a re-inserted key from the entry a cleanup pass saw.
    generation: u64,
}

enum Lookup<V> {
    Hit(V),
    Expired(u64),
    Absent,
}

/// Size- and recency-bounded in-memory cache.
pub struct WeightedBoundedCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    total_weight: AtomicU64,
    config: MemoryCacheConfig,
    epoch: Instant,
    last_cleanup: AtomicU64,
    cleanup_lock: Mutex<()>,
    fill_locks: KeyedMutex,
    next_generation: AtomicU64,
    counters: MemoryCacheCounters,
}

impl<V> WeightedBoundedCache<V>
where
    V: Clone + Weighted,
{
    /// Create an empty cache.
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            total_weight: AtomicU64::new(0),
            config,
            epoch: Instant::now(),
            last_cleanup: AtomicU64::new(0),
            cleanup_lock: Mutex::new(()),
            fill_locks: KeyedMutex::new(),
            next_generation: AtomicU64::new(0),
            counters: MemoryCacheCounters::default(),
        }
    }

    /// Get a cached value.
    ///
    /// Refreshes the entry's sliding window on a hit. An entry whose window
    /// has already lapsed is treated as absent and removed.
    pub fn get(&self, key: &str) -> Option<V> {
        match self.lookup(key) {
            Lookup::Hit(value) => {
                self.counters.record_hit();
                Some(value)
            }
            Lookup::Expired(generation) => {
                if self.remove_generation(key, generation) {
                    self.counters.record_expirations(1);
                }
                self.counters.record_miss();
                None
            }
            Lookup::Absent => {
                self.counters.record_miss();
                None
            }
        }
    }

    /// Insert or replace a value.
    ///
    /// A value heavier than the whole ceiling is not cached, and any older
    /// value under the same key is dropped so readers never see it again.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let weight = self.weigh(&key, &value);

        if weight > self.config.max_weight_bytes {
            self.counters.record_oversized();
            self.remove(&key);
            debug!(
                key = %key,
                weight,
                max_weight = self.config.max_weight_bytes,
                "Value heavier than memory cache ceiling - not cached"
            );
            return;
        }

        let entry = CacheEntry {
            value,
            weight,
            last_accessed: AtomicU64::new(self.now_nanos()),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        };

        // Charge before inserting so a concurrent removal never subtracts first.
        self.total_weight.fetch_add(weight, Ordering::Relaxed);
        if let Some(old) = self.entries.insert(key, entry) {
            self.total_weight.fetch_sub(old.weight, Ordering::Relaxed);
        }
        self.counters.record_insertion();

        self.maybe_cleanup();
    }

    /// Get a value, producing and caching it on a miss.
    ///
    /// Only one caller per key is expected to run `produce`: others wait up
    /// to `timeout` on the per-key lock and then find the filled entry. A
    /// caller whose wait times out produces the value itself, so `produce`
    /// must be idempotent.
    pub fn get_or_insert_with<F, E>(&self, key: &str, timeout: Duration, produce: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        match self.fill_locks.lock(key, timeout) {
            Ok(_guard) => {
                if let Lookup::Hit(value) = self.lookup(key) {
                    self.counters.record_hit();
                    return Ok(value);
                }
                let value = produce()?;
                self.set(key, value.clone());
                Ok(value)
            }
            Err(timeout) => {
                self.counters.record_redundant_fill();
                debug!(key, error = %timeout, "Fill lock timed out - producing redundantly");
                let value = produce()?;
                self.set(key, value.clone());
                Ok(value)
            }
        }
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                self.total_weight.fetch_sub(entry.weight, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Check if a live (unexpired) entry exists without refreshing it.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.now_nanos();
        self.entries
            .get(key)
            .is_some_and(|entry| !self.is_expired(&entry, now))
    }

    /// Run a cleanup pass now, regardless of the throttle interval.
    pub fn cleanup_now(&self) {
        self.cleanup();
    }

    /// Current summed weight in bytes.
    pub fn weight_bytes(&self) -> u64 {
        self.total_weight.load(Ordering::Relaxed)
    }

    /// Current number of entries (including lapsed ones not yet cleaned up).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    pub fn stats(&self) -> MemoryCacheStats {
        self.counters
            .snapshot(self.weight_bytes(), self.entry_count())
    }

    /// Weight that `value` stored under `key` is charged.
    pub fn weigh(&self, key: &str, value: &V) -> u64 {
        self.config
            .entry_overhead_bytes
            .saturating_add((key.len() as u64).saturating_mul(self.config.key_byte_weight))
            .saturating_add(value.payload_bytes() as u64)
    }

    fn lookup(&self, key: &str) -> Lookup<V> {
        let now = self.now_nanos();
        match self.entries.get(key) {
            Some(entry) if self.is_expired(&entry, now) => Lookup::Expired(entry.generation),
            Some(entry) => {
                entry.last_accessed.store(now, Ordering::Relaxed);
                Lookup::Hit(entry.value.clone())
            }
            None => Lookup::Absent,
        }
    }

    fn maybe_cleanup(&self) {
        let over_ceiling = self.weight_bytes() > self.config.max_weight_bytes;
        let since_last = self
            .now_nanos()
            .saturating_sub(self.last_cleanup.load(Ordering::Relaxed));
        let due = since_last >= duration_nanos(self.config.min_cleanup_interval);

        if over_ceiling || due {
            self.cleanup();
        }
    }

    fn cleanup(&self) {
        // Another pass is already running; it will cover our insert.
        let Some(_pass) = self.cleanup_lock.try_lock() else {
            return;
        };

        let now = self.now_nanos();
        self.last_cleanup.store(now, Ordering::Relaxed);

        let lapsed: Vec<(String, u64)> = self
            .entries
            .iter()
            .filter(|entry| self.is_expired(entry.value(), now))
            .map(|entry| (entry.key().clone(), entry.value().generation))
            .collect();

        let mut expired = 0;
        for (key, generation) in lapsed {
            if self.remove_generation(&key, generation) {
                expired += 1;
            }
        }

        let mut evicted = 0;
        if self.weight_bytes() > self.config.max_weight_bytes {
            let mut candidates: Vec<(String, u64, u64)> = self
                .entries
                .iter()
                .map(|entry| {
                    (
                        entry.key().clone(),
                        entry.value().last_accessed.load(Ordering::Relaxed),
                        entry.value().generation,
                    )
                })
                .collect();

            // Oldest access first
            candidates.sort_by_key(|(_, accessed, _)| *accessed);

            for (key, _, generation) in candidates {
                if self.weight_bytes() <= self.config.max_weight_bytes {
                    break;
                }
                if self.remove_generation(&key, generation) {
                    evicted += 1;
                }
            }
        }

        self.counters.record_cleanup_pass();
        self.counters.record_expirations(expired);
        self.counters.record_evictions(evicted);

        if expired > 0 || evicted > 0 {
            debug!(
                expired,
                evicted,
                weight_bytes = self.weight_bytes(),
                entries = self.entries.len(),
                "Memory cache cleanup pass"
            );
        }
    }

    /// Remove `key` only if it still holds the entry with `generation`.
    fn remove_generation(&self, key: &str, generation: u64) -> bool {
        match self
            .entries
            .remove_if(key, |_, entry| entry.generation == generation)
        {
            Some((_, entry)) => {
                self.total_weight.fetch_sub(entry.weight, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: u64) -> bool {
        let idle = now.saturating_sub(entry.last_accessed.load(Ordering::Relaxed));
        idle > duration_nanos(self.config.sliding_expiration)
    }

    fn now_nanos(&self) -> u64 {
        duration_nanos(self.epoch.elapsed())
    }
}

fn duration_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}
