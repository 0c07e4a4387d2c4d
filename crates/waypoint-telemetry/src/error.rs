//! Errors raised while creating, installing or shutting down the tracer.

use thiserror::Error;

/// Telemetry pipeline errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The tracer configuration is unusable: empty service name, invalid
    /// port, or an exporter endpoint that did not resolve in time.
    /// Fatal at startup.
    #[error("tracer configuration error: {reason}")]
    Configuration { reason: String },

    /// The OTLP exporter could not be built.
    #[error("failed to build OTLP exporter: {reason}")]
    ExporterBuild { reason: String },

    /// The collector could not be reached while flushing. Buffered spans
    /// were dropped.
    #[error("trace exporter unavailable: {reason}")]
    ExporterUnavailable { reason: String },

    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {reason}")]
    Subscriber { reason: String },
}

impl TelemetryError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
