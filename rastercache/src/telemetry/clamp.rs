//! Segment clamping: quantizing a wide value domain into few buckets.
//!
//! A domain is split into ascending bands. Inside a band every value is
//! rounded down to a multiple of that band's granularity, so dense regions
//! keep fine resolution while the long tail collapses into coarse buckets.
//! Values above the configured maximum land in the maximum's bucket.

use thiserror::Error;

/// Upper bound on the distinct buckets one clamping may produce.
pub const MAX_BUCKETS: usize = 4096;

/// One band: values at or above `threshold_above` (and below the next
/// band's threshold) are rounded down to a multiple of `granularity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentPrecision {
    pub threshold_above: u64,
    pub granularity: u64,
}

impl SegmentPrecision {
    pub const fn new(threshold_above: u64, granularity: u64) -> Self {
        Self {
            threshold_above,
            granularity,
        }
    }
}

/// Invalid band configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClampingError {
    #[error("at least one segment is required")]
    Empty,

    #[error("first segment must start at 0, found {0}")]
    FirstThresholdNotZero(u64),

    #[error("segment thresholds must be strictly ascending ({previous} then {next})")]
    NotAscending { previous: u64, next: u64 },

    #[error("segment at {threshold} has zero granularity")]
    ZeroGranularity { threshold: u64 },

    #[error("segment threshold {threshold} is not a multiple of its granularity {granularity}")]
    Misaligned { threshold: u64, granularity: u64 },

    #[error("maximum value {max} is below the last threshold {threshold}")]
    MaxBelowThreshold { max: u64, threshold: u64 },

    #[error("clamping yields {count} buckets, limit is {limit}")]
    TooManyBuckets { count: usize, limit: usize },
}

/// Validated band layout with a value ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentClamping {
    segments: Vec<SegmentPrecision>,
    max_value: u64,
    bucket_count: usize,
}

impl SegmentClamping {
    /// Validate and build a clamping.
    ///
    /// Segments must start at 0, ascend strictly, have non-zero granularity,
    /// and start on a multiple of their own granularity; the resulting
    /// alphabet must not exceed [`MAX_BUCKETS`].
    pub fn new(segments: Vec<SegmentPrecision>, max_value: u64) -> Result<Self, ClampingError> {
        let first = segments.first().ok_or(ClampingError::Empty)?;
        if first.threshold_above != 0 {
            return Err(ClampingError::FirstThresholdNotZero(first.threshold_above));
        }

        for segment in &segments {
            if segment.granularity == 0 {
                return Err(ClampingError::ZeroGranularity {
                    threshold: segment.threshold_above,
                });
            }
            if segment.threshold_above % segment.granularity != 0 {
                return Err(ClampingError::Misaligned {
                    threshold: segment.threshold_above,
                    granularity: segment.granularity,
                });
            }
        }

        for pair in segments.windows(2) {
            if pair[1].threshold_above <= pair[0].threshold_above {
                return Err(ClampingError::NotAscending {
                    previous: pair[0].threshold_above,
                    next: pair[1].threshold_above,
                });
            }
        }

        let last = segments[segments.len() - 1];
        if max_value < last.threshold_above {
            return Err(ClampingError::MaxBelowThreshold {
                max: max_value,
                threshold: last.threshold_above,
            });
        }

        let bucket_count = count_buckets(&segments, max_value);
        if bucket_count > MAX_BUCKETS {
            return Err(ClampingError::TooManyBuckets {
                count: bucket_count,
                limit: MAX_BUCKETS,
            });
        }

        Ok(Self {
            segments,
            max_value,
            bucket_count,
        })
    }

    /// One band covering `0..=max_value` at a fixed granularity.
    pub fn linear(granularity: u64, max_value: u64) -> Result<Self, ClampingError> {
        Self::new(vec![SegmentPrecision::new(0, granularity)], max_value)
    }

    /// Bucket for `value`: its lower bound within the active band.
    pub fn clamp(&self, value: u64) -> u64 {
        let value = value.min(self.max_value);
        let segment = self.segment_for(value);
        value - value % segment.granularity
    }

    /// Representative value for a bucket, used for display.
    ///
    /// Buckets are identified by their lower bound, which is returned as-is.
    pub fn unclamp(&self, bucket: u64) -> u64 {
        bucket
    }

    /// Every bucket in ascending order.
    pub fn buckets(&self) -> impl Iterator<Item = u64> + '_ {
        let max_value = self.max_value;
        self.segments.iter().enumerate().flat_map(move |(i, segment)| {
            let end = self
                .segments
                .get(i + 1)
                .map(|next| next.threshold_above)
                .unwrap_or_else(|| max_value.saturating_add(1));
            let step = segment.granularity;
            std::iter::successors(Some(segment.threshold_above), move |b| b.checked_add(step))
                .take_while(move |b| *b < end)
        })
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    pub fn segments(&self) -> &[SegmentPrecision] {
        &self.segments
    }

    pub fn max_value(&self) -> u64 {
        self.max_value
    }

    fn segment_for(&self, value: u64) -> SegmentPrecision {
        let idx = self
            .segments
            .partition_point(|segment| segment.threshold_above <= value);
        // First threshold is 0, so idx >= 1.
        self.segments[idx.saturating_sub(1)]
    }
}

fn count_buckets(segments: &[SegmentPrecision], max_value: u64) -> usize {
    let mut total: u64 = 0;
    for (i, segment) in segments.iter().enumerate() {
        let span = match segments.get(i + 1) {
            Some(next) => (next.threshold_above - segment.threshold_above).div_ceil(segment.granularity),
            None => (max_value - segment.threshold_above) / segment.granularity + 1,
        };
        total = total.saturating_add(span);
    }
    usize::try_from(total).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn three_bands() -> SegmentClamping {
        SegmentClamping::new(
            vec![
                SegmentPrecision::new(0, 10),
                SegmentPrecision::new(100, 50),
                SegmentPrecision::new(1_000, 500),
            ],
            5_000,
        )
        .unwrap()
    }

    #[test]
    fn test_clamp_rounds_down_within_band() {
        let clamping = three_bands();
        assert_eq!(clamping.clamp(0), 0);
        assert_eq!(clamping.clamp(99), 90);
        assert_eq!(clamping.clamp(100), 100);
        assert_eq!(clamping.clamp(149), 100);
        assert_eq!(clamping.clamp(999), 950);
        assert_eq!(clamping.clamp(1_499), 1_000);
    }

    #[test]
    fn test_clamp_caps_at_max() {
        let clamping = three_bands();
        assert_eq!(clamping.clamp(5_000), 5_000);
        assert_eq!(clamping.clamp(u64::MAX), 5_000);
    }

    #[test]
    fn test_unclamp_returns_bucket_lower_bound() {
        let clamping = three_bands();
        assert_eq!(clamping.unclamp(clamping.clamp(1_234)), 1_000);
    }

    #[test]
    fn test_buckets_match_count() {
        let clamping = three_bands();
        let buckets: Vec<u64> = clamping.buckets().collect();

        // 10 + 18 + 9
        assert_eq!(buckets.len(), 37);
        assert_eq!(clamping.bucket_count(), 37);
        assert_eq!(buckets.first(), Some(&0));
        assert_eq!(buckets.last(), Some(&5_000));
        assert!(buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_linear() {
        let clamping = SegmentClamping::linear(1, 100).unwrap();
        assert_eq!(clamping.bucket_count(), 101);
        assert_eq!(clamping.clamp(57), 57);
    }

    #[test]
    fn test_validation_errors() {
        assert_eq!(SegmentClamping::new(vec![], 10), Err(ClampingError::Empty));
        assert_eq!(
            SegmentClamping::new(vec![SegmentPrecision::new(5, 5)], 10),
            Err(ClampingError::FirstThresholdNotZero(5))
        );
        assert_eq!(
            SegmentClamping::linear(0, 10),
            Err(ClampingError::ZeroGranularity { threshold: 0 })
        );
        assert_eq!(
            SegmentClamping::new(
                vec![SegmentPrecision::new(0, 10), SegmentPrecision::new(105, 10)],
                200
            ),
            Err(ClampingError::Misaligned {
                threshold: 105,
                granularity: 10
            })
        );
        assert_eq!(
            SegmentClamping::new(
                vec![SegmentPrecision::new(0, 10), SegmentPrecision::new(0, 20)],
                200
            ),
            Err(ClampingError::NotAscending { previous: 0, next: 0 })
        );
        assert_eq!(
            SegmentClamping::new(
                vec![SegmentPrecision::new(0, 10), SegmentPrecision::new(100, 10)],
                50
            ),
            Err(ClampingError::MaxBelowThreshold {
                max: 50,
                threshold: 100
            })
        );
        assert_eq!(
            SegmentClamping::linear(1, 10_000),
            Err(ClampingError::TooManyBuckets {
                count: 10_001,
                limit: MAX_BUCKETS
            })
        );
    }

    proptest! {
        #[test]
        fn prop_clamp_is_a_bucket_and_monotonic(a in 0u64..10_000, b in 0u64..10_000) {
            let clamping = three_bands();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

            prop_assert!(clamping.clamp(lo) <= clamping.clamp(hi));
            prop_assert!(clamping.clamp(lo) <= lo);
            prop_assert!(clamping.buckets().any(|bucket| bucket == clamping.clamp(lo)));
        }
    }
}
