//! # Middleware
//!
//! Cross-cutting layers applied to the whole application router:
//!
//! - `tracing_layer`: one access-log span per request, parented on the
//!   caller's W3C trace context.
//! - `metrics`: request counters and latency histograms, exported in the
//!   Prometheus text format.
//!
//! Authentication is route-scoped and lives in [`crate::auth`].

pub mod metrics;
pub mod tracing_layer;
