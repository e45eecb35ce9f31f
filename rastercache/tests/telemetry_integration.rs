//! Integration tests for sketch-backed telemetry under concurrent reporting.

use rastercache::telemetry::{SinkProfile, TelemetryError, TelemetryRegistry, PIXELS_SINK};
use std::sync::Arc;
use std::thread;

const UNIFORM: &str = "test.uniform";

fn registry_with_uniform_sink(seed: u64) -> Arc<TelemetryRegistry> {
    let registry = Arc::new(TelemetryRegistry::with_default_sinks(seed));
    registry
        .register(UNIFORM, SinkProfile::linear(1, 100).unwrap())
        .unwrap();
    registry
}

#[test]
fn test_median_of_concurrent_uniform_reports() {
    let registry = registry_with_uniform_sink(5);

    thread::scope(|scope| {
        for worker in 0..4u64 {
            let registry = &registry;
            scope.spawn(move || {
                for i in (worker..1000).step_by(4) {
                    registry.report(UNIFORM, i * 101 / 1000);
                }
            });
        }
    });

    let sink = registry.sink(UNIFORM).unwrap();
    assert_eq!(sink.count(), 1000);

    let median = registry.percentile(UNIFORM, 0.5).unwrap();
    assert!(median.abs_diff(50) <= 1, "median was {median}");
}

#[test]
fn test_percentiles_are_monotonic() {
    let registry = registry_with_uniform_sink(9);
    for i in 0..500u64 {
        registry.report(UNIFORM, (i * 37) % 101);
    }

    let ps = [0.01, 0.1, 0.25, 0.5, 0.75, 0.9, 0.99];
    let values = registry.percentiles(UNIFORM, &ps).unwrap();
    assert!(
        values.windows(2).all(|pair| pair[0] <= pair[1]),
        "not monotonic: {values:?}"
    );
}

#[test]
fn test_pixel_sink_resolves_image_sizes() {
    let registry = TelemetryRegistry::with_default_sinks(1);
    for _ in 0..90 {
        registry.report(PIXELS_SINK, 640 * 480);
    }
    for _ in 0..10 {
        registry.report(PIXELS_SINK, 6000 * 4000);
    }

    let p50 = registry.percentile(PIXELS_SINK, 0.5).unwrap();
    let p99 = registry.percentile(PIXELS_SINK, 0.99).unwrap();
    assert!(p50 <= 640 * 480, "p50 was {p50}");
    assert!(p99 > 1_000_000, "p99 was {p99}");
}

#[test]
fn test_unknown_sink_is_dropped_not_fatal() {
    let registry = TelemetryRegistry::new(0);
    registry.report("never.registered", 10);

    assert_eq!(registry.dropped_reports(), 1);
    assert!(matches!(
        registry.percentile("never.registered", 0.5),
        Err(TelemetryError::UnknownSink(_))
    ));
}
