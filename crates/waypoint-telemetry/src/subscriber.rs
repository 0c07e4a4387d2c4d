//! Global subscriber installation.
//!
//! Layers, bottom up: `EnvFilter` (`RUST_LOG`, falling back to the
//! configured default), the OpenTelemetry bridge when a tracer is given,
//! and a `fmt` layer in pretty or JSON form.

use opentelemetry::trace::TracerProvider as _;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogConfig, LogFormat};
use crate::error::TelemetryError;
use crate::lifecycle::TracerHandle;

/// Install the process-wide subscriber. May be called once.
pub fn init_subscriber(
    config: &LogConfig,
    tracer: Option<&TracerHandle>,
) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| TelemetryError::configuration(format!("invalid log filter: {e}")))?;

    let otel = tracer.map(|handle| {
        let tracer = handle
            .provider()
            .tracer(handle.service_name().to_string());
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    let registry = tracing_subscriber::registry().with(filter).with(otel);

    let installed = match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    installed.map_err(|e| TelemetryError::Subscriber {
        reason: e.to_string(),
    })
}
