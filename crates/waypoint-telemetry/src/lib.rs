//! # waypoint-telemetry: Tracer Lifecycle and Operation Spans
//!
//! Owns the process-wide tracer and the span discipline every request rides on.
//!
//! ## Lifecycle
//!
//! ```text
//! create(config) ──► (TracerHandle, ShutdownGuard)
//!                        │               │
//!                        │               └─ drop / shutdown(): flush, bounded by flush_timeout
//!                        └─ init_subscriber(): tracing → OTLP bridge
//! ```
//!
//! [`create`] resolves the exporter endpoint under a connect timeout and
//! fails with [`TelemetryError::Configuration`] instead of hanging. The
//! returned [`ShutdownGuard`] flushes buffered spans when dropped, so the
//! flush runs on every exit path of the scope that owns it. Shutdown is
//! idempotent; a second call is a no-op.
//!
//! ## Spans
//!
//! [`OperationSpan`] is a scoped span: it is closed with an explicit
//! [`SpanStatus`] by [`OperationSpan::finish`], and if it is dropped
//! unfinished (the future was cancelled, or the code unwound) it closes
//! itself with `cancelled` or `error`. Export is batched off the request
//! path; an unreachable collector drops spans, never requests.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod propagation;
pub mod span;
pub mod subscriber;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use config::{ExporterProtocol, LogConfig, LogFormat, SpanGranularity, TracingConfig};
pub use error::TelemetryError;
pub use lifecycle::{create, ShutdownGuard, ShutdownOutcome, TracerHandle};
pub use propagation::{attach_remote_parent, extract_remote_context, HeaderExtractor};
pub use span::{OperationSpan, SpanStatus};
pub use subscriber::init_subscriber;
