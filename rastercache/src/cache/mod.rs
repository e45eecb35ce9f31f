//! Cache keys, results, and the weighted in-memory tier.
//!
//! The on-disk tier is an external collaborator reached through
//! [`crate::orchestrator::ArtifactStore`]; this module holds what is shared
//! between tiers plus [`WeightedBoundedCache`], the byte- and time-bounded
//! working set kept fully in memory.

mod memory;
mod stats;
mod types;

pub use memory::{WeightedBoundedCache, Weighted};
pub use stats::MemoryCacheStats;
pub use types::{CacheKey, CacheOutcome, CacheResult, MemoryCacheConfig};
