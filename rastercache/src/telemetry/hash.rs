//! Seeded affine hash family for sketch rows.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Mersenne prime 2^61 - 1, the modulus for every row hash.
pub const MERSENNE_61: u64 = (1 << 61) - 1;

/// `h(x) = (a·x + b) mod p` with `p = 2^61 - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffineHash {
    a: u64,
    b: u64,
}

impl AffineHash {
    /// Coefficients are reduced mod p; a zero multiplier becomes 1.
    pub fn new(a: u64, b: u64) -> Self {
        let a = a % MERSENNE_61;
        Self {
            a: if a == 0 { 1 } else { a },
            b: b % MERSENNE_61,
        }
    }

    pub fn hash(&self, x: u64) -> u64 {
        let p = MERSENNE_61 as u128;
        let x = x as u128 % p;
        ((self.a as u128 * x + self.b as u128) % p) as u64
    }

    /// Hash reduced to a column index in `0..width`.
    pub fn column(&self, x: u64, width: usize) -> usize {
        (self.hash(x) % width as u64) as usize
    }
}

/// Independent row hashes drawn from one seeded generator.
///
/// The same seed always yields the same family, so sketches built by a
/// restarted process bucket values identically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFamily {
    rows: Vec<AffineHash>,
}

impl HashFamily {
    pub fn seeded(seed: u64, rows: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = (0..rows)
            .map(|_| AffineHash::new(rng.gen_range(1..MERSENNE_61), rng.gen_range(0..MERSENNE_61)))
            .collect();
        Self { rows }
    }

    pub fn rows(&self) -> &[AffineHash] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
