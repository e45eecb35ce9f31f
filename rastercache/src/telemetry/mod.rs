//! Approximate usage telemetry under fixed memory.
//!
//! Pixel counts, resolutions, and latencies are tracked without storing raw
//! samples. Each [`Sink`] quantizes values with a [`SegmentClamping`] profile
//! and counts the buckets in a lock-free [`CountMinSketch`]; percentiles are
//! read back by walking the buckets in order.
//!
//! ```text
//! report(v) ──► clamp(v) ──► for each row r: table[r][h_r(bucket) mod W] += 1
//!
//! percentile(p) ──► for bucket in ascending order:
//!                       seen += min_r table[r][h_r(bucket) mod W]
//!                       stop when seen >= ceil(p * count)
//! ```
//!
//! Memory per sink is `W * D * 8` bytes, fixed at registration.

mod clamp;
mod hash;
mod registry;
mod sink;
mod sketch;

pub use clamp::{ClampingError, SegmentClamping, SegmentPrecision, MAX_BUCKETS};
pub use hash::{AffineHash, HashFamily, MERSENNE_61};
pub use registry::{
    SinkSnapshot, TelemetryError, TelemetryRegistry, GET_OR_CREATE_SINK, PIXELS_SINK,
    RESOLUTION_SINK,
};
pub use sink::{Sink, SinkProfile};
pub use sketch::CountMinSketch;
