//! Diagnostics collaborator for failures that never reach the caller.
//!
//! Background write failures happen after the original request has already
//! been answered, so they are surfaced only here. Implementations must be
//! cheap and must not panic.

mod noop;
mod tracing_adapter;
mod r#trait;

pub use noop::NoOpDiagnostics;
pub use r#trait::Diagnostics;
pub use tracing_adapter::TracingDiagnostics;
