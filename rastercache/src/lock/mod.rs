//! Per-key mutual exclusion.
//!
//! [`KeyedMutex`] limits duplicate expensive work: at most one critical
//! section runs per key at any instant, while distinct keys proceed in
//! parallel. Waiting is always bounded by a caller-supplied timeout.
//!
//! # Example
//!
//! ```
//! use rastercache::lock::KeyedMutex;
//! use std::time::Duration;
//!
//! let locks = KeyedMutex::new();
//! let resized = locks.try_execute("photos/cat.jpg", Duration::from_secs(1), || {
//!     // expensive work for this key only
//!     42
//! });
//! assert_eq!(resized, Ok(42));
//! assert_eq!(locks.active_keys(), 0);
//! ```

mod keyed;

pub use keyed::{KeyedGuard, KeyedMutex, LockTimeout};
