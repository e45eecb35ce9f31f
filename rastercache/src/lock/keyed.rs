//! Refcounted lock registry keyed by string.
//!
//! The registry maps each contended key to a [`LockEntry`] holding a
//! reference count and a `held` flag. Entries are created on first use and
//! removed as soon as the last waiter or holder lets go, so the registry only
//! ever contains keys that are currently locked or waited on.
//!
//! The registry mutex is held only while an entry is inserted, claimed,
//! released, or removed. Callers block on a per-entry condition variable
//! (which parks them with the registry mutex released), and the caller's own
//! critical section runs with no registry lock held at all.
//!
//! Re-entrant use is not supported: a thread that already holds the lock for
//! a key and asks for the same key again waits for itself until the timeout
//! elapses.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// The lock for a key could not be acquired before the timeout elapsed.
///
/// Non-fatal: the caller decides whether to proceed without the lock, redo
/// the work, or fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Timed out after {timeout:?} waiting for lock on '{key}'")]
pub struct LockTimeout {
    /// Key that was contended.
    pub key: String,
    /// How long the caller was willing to wait.
    pub timeout: Duration,
}

/// Registry entry for one contended key.
struct LockEntry {
    /// Holders plus waiters currently referencing this entry.
    refcount: usize,
    /// Whether some caller is inside the critical section.
    held: bool,
    /// Signalled when `held` goes back to false.
    released: Arc<Condvar>,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            refcount: 0,
            held: false,
            released: Arc::new(Condvar::new()),
        }
    }
}

/// Exclusive execution scoped to a string key.
///
/// Owned by whichever component needs it (there is no process-wide
/// instance); share it behind an `Arc` when several owners need the same
/// key space.
pub struct KeyedMutex {
    entries: Mutex<HashMap<String, LockEntry>>,
    acquisitions: AtomicU64,
    contended: AtomicU64,
    timeouts: AtomicU64,
}

impl KeyedMutex {
    /// Creates an empty lock registry.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            acquisitions: AtomicU64::new(0),
            contended: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Runs `action` while holding the lock for `key`.
    ///
    /// Waits at most `timeout` for the lock. On success the action runs
    /// synchronously on the calling thread and its return value is passed
    /// back; the lock is released on every exit path, including a panic
    /// inside `action`. On timeout `action` is never invoked.
    pub fn try_execute<R, F>(&self, key: &str, timeout: Duration, action: F) -> Result<R, LockTimeout>
    where
        F: FnOnce() -> R,
    {
        let _guard = self.lock(key, timeout)?;
        Ok(action())
    }

    /// Acquires the lock for `key`, returning a guard that releases it on drop.
    ///
    /// This is the building block behind [`try_execute`](Self::try_execute)
    /// for callers that need to decide what to do after a timeout without
    /// giving up ownership of their work closure.
    pub fn lock(&self, key: &str, timeout: Duration) -> Result<KeyedGuard<'_>, LockTimeout> {
        // No deadline when the timeout is too large to represent.
        let deadline = Instant::now().checked_add(timeout);
        let mut entries = self.entries.lock();

        let entry = entries.entry(key.to_owned()).or_insert_with(LockEntry::new);
        entry.refcount += 1;
        if entry.held {
            self.contended.fetch_add(1, Ordering::Relaxed);
        }

        loop {
            let released = match entries.get_mut(key) {
                Some(entry) if !entry.held => {
                    entry.held = true;
                    break;
                }
                Some(entry) => Arc::clone(&entry.released),
                None => {
                    // Our reference keeps the entry alive; rebuild it if it vanished.
                    let mut entry = LockEntry::new();
                    entry.refcount = 1;
                    entry.held = true;
                    entries.insert(key.to_owned(), entry);
                    break;
                }
            };

            let timed_out = match deadline {
                Some(deadline) => released.wait_until(&mut entries, deadline).timed_out(),
                None => {
                    released.wait(&mut entries);
                    false
                }
            };
            if timed_out {
                if let Some(entry) = entries.get_mut(key) {
                    if !entry.held {
                        entry.held = true;
                        break;
                    }
                }

                Self::drop_reference(&mut entries, key);
                drop(entries);

                self.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!(key, timeout_ms = timeout.as_millis() as u64, "Keyed lock wait timed out");
                return Err(LockTimeout {
                    key: key.to_owned(),
                    timeout,
                });
            }
        }

        drop(entries);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);

        Ok(KeyedGuard {
            owner: self,
            key: key.to_owned(),
        })
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether some caller currently holds the lock for `key`.
    pub fn is_held(&self, key: &str) -> bool {
        self.entries.lock().get(key).is_some_and(|entry| entry.held)
    }

    /// Total successful acquisitions since creation.
    pub fn acquisitions(&self) -> u64 {
        self.acquisitions.load(Ordering::Relaxed)
    }

    /// Acquisitions that had to wait for another holder.
    pub fn contended(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }

    /// Acquisition attempts that gave up after their timeout.
    pub fn timeouts(&self) -> u64 {
        self.timeouts.load(Ordering::Relaxed)
    }

    fn release(&self, key: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.held = false;
            entry.released.notify_one();
        }
        Self::drop_reference(&mut entries, key);
    }

    /// Decrements the refcount for `key`, removing the entry at zero.
    fn drop_reference(entries: &mut MutexGuard<'_, HashMap<String, LockEntry>>, key: &str) {
        let remove = match entries.get_mut(key) {
            Some(entry) => {
                entry.refcount = entry.refcount.saturating_sub(1);
                entry.refcount == 0
            }
            None => false,
        };
        if remove {
            entries.remove(key);
        }
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the lock for one key until dropped.
#[must_use = "the key is unlocked as soon as the guard is dropped"]
pub struct KeyedGuard<'a> {
    owner: &'a KeyedMutex,
    key: String,
}

impl KeyedGuard<'_> {
    /// The key this guard holds.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.owner.release(&self.key);
    }
}

impl std::fmt::Debug for KeyedGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedGuard").field("key", &self.key).finish()
    }
}
