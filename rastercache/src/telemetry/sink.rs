//! Named telemetry channels: a clamping profile over a sketch.

use crate::telemetry::clamp::{ClampingError, SegmentClamping, SegmentPrecision};
use crate::telemetry::sketch::CountMinSketch;
use std::sync::atomic::{AtomicU64, Ordering};

const MEGAPIXEL: u64 = 1_000_000;

/// Clamping plus sketch dimensions. Sinks differ only by profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkProfile {
    clamping: SegmentClamping,
    width: usize,
    depth: usize,
}

impl SinkProfile {
    pub fn new(clamping: SegmentClamping, width: usize, depth: usize) -> Self {
        Self {
            clamping,
            width: width.max(1),
            depth: depth.max(1),
        }
    }

    /// Pixel counts up to 400 MP: 0.1 MP buckets below 8 MP, 1 MP to 40 MP,
    /// 5 MP beyond.
    pub fn pixels() -> Result<Self, ClampingError> {
        let clamping = SegmentClamping::new(
            vec![
                SegmentPrecision::new(0, MEGAPIXEL / 10),
                SegmentPrecision::new(8 * MEGAPIXEL, MEGAPIXEL),
                SegmentPrecision::new(40 * MEGAPIXEL, 5 * MEGAPIXEL),
            ],
            400 * MEGAPIXEL,
        )?;
        Ok(Self::new(clamping, 380, 3))
    }

    /// Image edge lengths up to 16000 px.
    pub fn resolution() -> Result<Self, ClampingError> {
        let clamping = SegmentClamping::new(
            vec![
                SegmentPrecision::new(0, 10),
                SegmentPrecision::new(2_000, 50),
                SegmentPrecision::new(5_000, 200),
            ],
            16_000,
        )?;
        Ok(Self::new(clamping, 380, 3))
    }

    /// Durations in microseconds up to ten minutes.
    pub fn duration_micros() -> Result<Self, ClampingError> {
        let clamping = SegmentClamping::new(
            vec![
                SegmentPrecision::new(0, 100),
                SegmentPrecision::new(10_000, 1_000),
                SegmentPrecision::new(100_000, 10_000),
                SegmentPrecision::new(1_000_000, 100_000),
                SegmentPrecision::new(10_000_000, 5_000_000),
            ],
            600_000_000,
        )?;
        Ok(Self::new(clamping, 1280, 4))
    }

    /// Flat profile. The table is sized well above the bucket count so
    /// collisions stay rare.
    pub fn linear(granularity: u64, max_value: u64) -> Result<Self, ClampingError> {
        let clamping = SegmentClamping::linear(granularity, max_value)?;
        let width = (clamping.bucket_count() * 8).max(380);
        Ok(Self::new(clamping, width, 4))
    }

    pub fn clamping(&self) -> &SegmentClamping {
        &self.clamping
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// One telemetry channel.
///
/// Values are clamped to their bucket and counted in the sketch. The report
/// count and value sum are tracked exactly so percentile denominators and
/// means are correct.
#[derive(Debug)]
pub struct Sink {
    clamping: SegmentClamping,
    sketch: CountMinSketch,
    count: AtomicU64,
    sum: AtomicU64,
}

impl Sink {
    pub fn new(profile: SinkProfile, seed: u64) -> Self {
        Self {
            sketch: CountMinSketch::new(profile.width, profile.depth, seed),
            clamping: profile.clamping,
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
        }
    }

    pub fn report(&self, value: u64) {
        self.sketch.insert(self.clamping.clamp(value));
        // Saturates so one huge report cannot wrap the mean back to zero.
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |sum| {
                Some(sum.saturating_add(value))
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Values reported so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Exact mean of reported values, 0 when empty.
    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Sketch estimate for the bucket `value` falls in.
    pub fn estimate(&self, value: u64) -> u64 {
        self.sketch.estimate(self.clamping.clamp(value))
    }

    pub fn percentile(&self, p: f64) -> u64 {
        self.percentiles(&[p]).first().copied().unwrap_or(0)
    }

    /// Approximate values at each fraction in `ps`, in input order.
    ///
    /// Walks the buckets once in ascending order, summing the per-bucket
    /// estimates until each target rank `ceil(p * count)` is reached. `p` is
    /// clamped to `[0, 1]` and NaN is read as 0. An empty sink yields 0.
    pub fn percentiles(&self, ps: &[f64]) -> Vec<u64> {
        let total = self.count();
        let mut results = vec![0; ps.len()];
        if total == 0 || ps.is_empty() {
            return results;
        }

        let mut targets: Vec<(u64, usize)> = ps
            .iter()
            .enumerate()
            .map(|(i, p)| (target_rank(*p, total), i))
            .collect();
        targets.sort_unstable();

        let mut pending = targets.iter().peekable();
        let mut cumulative = 0u64;
        let mut last_bucket = 0;
        for bucket in self.clamping.buckets() {
            last_bucket = bucket;
            cumulative = cumulative.saturating_add(self.sketch.estimate(bucket));
            while let Some((_, index)) = pending.next_if(|(target, _)| *target <= cumulative) {
                results[*index] = self.clamping.unclamp(bucket);
            }
            if pending.peek().is_none() {
                return results;
            }
        }

        // Reports racing with this read can leave targets unmet.
        for (_, index) in pending {
            results[*index] = self.clamping.unclamp(last_bucket);
        }
        results
    }
}

fn target_rank(p: f64, total: u64) -> u64 {
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    ((p * total as f64).ceil() as u64).clamp(1, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn linear_sink() -> Sink {
        Sink::new(SinkProfile::linear(1, 100).unwrap(), 17)
    }

    #[test]
    fn test_builtin_profiles_validate() {
        let pixels = SinkProfile::pixels().unwrap();
        assert_eq!((pixels.width(), pixels.depth()), (380, 3));
        assert!(pixels.clamping().bucket_count() <= pixels.width());

        let resolution = SinkProfile::resolution().unwrap();
        assert_eq!((resolution.width(), resolution.depth()), (380, 3));
        assert!(resolution.clamping().bucket_count() <= resolution.width());

        let duration = SinkProfile::duration_micros().unwrap();
        assert_eq!((duration.width(), duration.depth()), (1280, 4));
        assert!(duration.clamping().bucket_count() <= duration.width());
    }

    #[test]
    fn test_pixel_buckets() {
        let clamping = SinkProfile::pixels().unwrap().clamping().clone();
        assert_eq!(clamping.clamp(1_234_567), 1_200_000);
        assert_eq!(clamping.clamp(12_345_678), 12_000_000);
        assert_eq!(clamping.clamp(123_456_789), 120_000_000);
        assert_eq!(clamping.clamp(u64::MAX), 400_000_000);
    }

    #[test]
    fn test_empty_sink() {
        let sink = linear_sink();
        assert_eq!(sink.percentile(0.5), 0);
        assert_eq!(sink.percentiles(&[0.1, 0.9]), vec![0, 0]);
        assert_eq!(sink.mean(), 0.0);
    }

    #[test]
    fn test_single_value() {
        let sink = linear_sink();
        sink.report(42);
        assert_eq!(sink.percentiles(&[0.0, 0.5, 1.0]), vec![42, 42, 42]);
        assert_eq!(sink.estimate(42), 1);
    }

    #[test]
    fn test_median_of_uniform_values() {
        let sink = linear_sink();
        for i in 0..1000u64 {
            sink.report(i * 101 / 1000);
        }

        let median = sink.percentile(0.5);
        assert!(median.abs_diff(50) <= 1, "median was {median}");
        assert_eq!(sink.count(), 1000);
    }

    #[test]
    fn test_percentiles_returned_in_input_order() {
        let sink = linear_sink();
        for value in 1..=100 {
            sink.report(value);
        }

        let results = sink.percentiles(&[0.9, 0.1, 0.5]);
        assert!(results[1] <= results[2]);
        assert!(results[2] <= results[0]);
    }

    #[test]
    fn test_out_of_range_fractions() {
        let sink = linear_sink();
        sink.report(10);
        sink.report(20);

        assert_eq!(sink.percentile(-1.0), 10);
        assert_eq!(sink.percentile(f64::NAN), 10);
        assert_eq!(sink.percentile(7.0), 20);
    }

    #[test]
    fn test_mean_uses_raw_values() {
        let sink = Sink::new(SinkProfile::linear(10, 100).unwrap(), 3);
        sink.report(3);
        sink.report(8);
        assert!((sink.mean() - 5.5).abs() < f64::EPSILON);
        assert_eq!(sink.percentile(1.0), 0);
    }

    #[test]
    fn test_sum_saturates_instead_of_wrapping() {
        let sink = Sink::new(SinkProfile::duration_micros().unwrap(), 5);
        sink.report(u64::MAX);
        sink.report(10);

        assert_eq!(sink.sum(), u64::MAX);
        assert_eq!(sink.count(), 2);
        assert!(sink.mean() >= (u64::MAX / 2) as f64);
    }

    proptest! {
        #[test]
        fn prop_percentiles_are_monotonic(values in prop::collection::vec(0u64..1_000_000, 1..300)) {
            let sink = Sink::new(SinkProfile::duration_micros().unwrap(), 11);
            for value in &values {
                sink.report(*value);
            }

            let p10 = sink.percentile(0.1);
            let p50 = sink.percentile(0.5);
            let p90 = sink.percentile(0.9);
            prop_assert!(p10 <= p50);
            prop_assert!(p50 <= p90);
        }

        #[test]
        fn prop_bucket_estimate_never_below_reports(value in 0u64..16_000, n in 1u64..50) {
            let sink = Sink::new(SinkProfile::resolution().unwrap(), 23);
            for _ in 0..n {
                sink.report(value);
            }
            prop_assert!(sink.estimate(value) >= n);
        }
    }
}
