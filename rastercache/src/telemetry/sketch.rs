//! Lock-free Count-Min Sketch.

use crate::telemetry::hash::HashFamily;
use std::sync::atomic::{AtomicU64, Ordering};

/// `depth` rows of `width` atomic counters, one seeded hash per row.
///
/// Allocated once and never resized or cleared. Inserts are one relaxed
/// `fetch_add` per row; cells need no consistency with each other since
/// estimates are approximate anyway. An estimate is the minimum over rows,
/// so it never under-counts.
pub struct CountMinSketch {
    hashes: HashFamily,
    width: usize,
    cells: Box<[AtomicU64]>,
}

impl CountMinSketch {
    /// Zero-sized dimensions are raised to 1.
    pub fn new(width: usize, depth: usize, seed: u64) -> Self {
        let width = width.max(1);
        let depth = depth.max(1);
        let cells = (0..width * depth).map(|_| AtomicU64::new(0)).collect();
        Self {
            hashes: HashFamily::seeded(seed, depth),
            width,
            cells,
        }
    }

    pub fn insert(&self, value: u64) {
        for (row, hash) in self.hashes.rows().iter().enumerate() {
            let cell = row * self.width + hash.column(value, self.width);
            self.cells[cell].fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Upper-bound estimate of how often `value` was inserted.
    pub fn estimate(&self, value: u64) -> u64 {
        self.hashes
            .rows()
            .iter()
            .enumerate()
            .map(|(row, hash)| {
                let cell = row * self.width + hash.column(value, self.width);
                self.cells[cell].load(Ordering::Relaxed)
            })
            .min()
            .unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.hashes.len()
    }
}

impl std::fmt::Debug for CountMinSketch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountMinSketch")
            .field("width", &self.width)
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_empty_estimates_zero() {
        let sketch = CountMinSketch::new(64, 3, 1);
        assert_eq!(sketch.estimate(12), 0);
    }

    #[test]
    fn test_exact_without_collisions() {
        let sketch = CountMinSketch::new(1024, 4, 1);
        for _ in 0..5 {
            sketch.insert(7);
        }
        assert_eq!(sketch.estimate(7), 5);
    }

    #[test]
    fn test_dimensions_clamped() {
        let sketch = CountMinSketch::new(0, 0, 1);
        assert_eq!(sketch.width(), 1);
        assert_eq!(sketch.depth(), 1);
        sketch.insert(1);
        sketch.insert(2);
        assert_eq!(sketch.estimate(3), 2);
    }

    #[test]
    fn test_concurrent_inserts_are_not_lost() {
        let sketch = Arc::new(CountMinSketch::new(380, 3, 9));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sketch = Arc::clone(&sketch);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        sketch.insert(42);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(sketch.estimate(42) >= 8_000);
    }

    proptest! {
        #[test]
        fn prop_never_underestimates(values in prop::collection::vec(0u64..500, 1..400)) {
            let sketch = CountMinSketch::new(64, 3, 5);
            let mut truth: HashMap<u64, u64> = HashMap::new();
            for value in &values {
                sketch.insert(*value);
                *truth.entry(*value).or_default() += 1;
            }
            for (value, count) in truth {
                prop_assert!(sketch.estimate(value) >= count);
            }
        }
    }
}
