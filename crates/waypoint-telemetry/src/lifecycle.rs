//! # Tracer Lifecycle
//!
//! One tracer per process, created explicitly at startup and passed to
//! whatever needs it. Nothing here touches the OpenTelemetry global
//! provider; the subscriber bridge and tests get the provider from the
//! [`TracerHandle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry_otlp::{Protocol, SpanExporter, WithExportConfig};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::config::{ExporterProtocol, SpanGranularity, TracingConfig};
use crate::error::TelemetryError;

/// Result of a shutdown call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Buffered spans were flushed and the exporter released.
    Flushed,
    /// An earlier call already shut the tracer down; nothing was done.
    AlreadyShutDown,
}

struct Inner {
    provider: SdkTracerProvider,
    service_name: String,
    endpoint: Option<String>,
    granularity: SpanGranularity,
    flush_timeout: Duration,
    shut_down: AtomicBool,
}

/// Handle to the process-wide tracer. Cheap to clone.
#[derive(Clone)]
pub struct TracerHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TracerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracerHandle")
            .field("service_name", &self.inner.service_name)
            .field("endpoint", &self.inner.endpoint)
            .field("granularity", &self.inner.granularity)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl TracerHandle {
    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    /// Collector URL, or `None` when export is disabled.
    pub fn endpoint(&self) -> Option<&str> {
        self.inner.endpoint.as_deref()
    }

    pub fn granularity(&self) -> SpanGranularity {
        self.inner.granularity
    }

    /// The SDK provider, for building tracers and subscriber layers.
    pub fn provider(&self) -> &SdkTracerProvider {
        &self.inner.provider
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    /// Flush buffered spans and release the exporter.
    ///
    /// Only the first call does anything; later calls return
    /// [`ShutdownOutcome::AlreadyShutDown`]. The flush runs on a helper
    /// thread and is abandoned after `flush_timeout`, in which case the
    /// unsent spans are lost and [`TelemetryError::ExporterUnavailable`]
    /// is returned.
    ///
    /// The caller's thread blocks for up to `flush_timeout`. On a
    /// multi-threaded Tokio runtime the wait goes through
    /// `block_in_place`, so other tasks keep running; on a current-thread
    /// runtime the whole runtime stalls for that long.
    pub fn shutdown(&self) -> Result<ShutdownOutcome, TelemetryError> {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            tracing::debug!("tracer already shut down");
            return Ok(ShutdownOutcome::AlreadyShutDown);
        }

        let provider = self.inner.provider.clone();
        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("tracer-shutdown".to_string())
            .spawn(move || {
                let _ = tx.send(provider.shutdown());
            })
            .map_err(|e| TelemetryError::ExporterUnavailable {
                reason: format!("could not start flush thread: {e}"),
            })?;

        match wait_for_flush(&rx, self.inner.flush_timeout) {
            Ok(Ok(())) => {
                tracing::info!(service = %self.inner.service_name, "tracer flushed and shut down");
                Ok(ShutdownOutcome::Flushed)
            }
            Ok(Err(e)) => Err(TelemetryError::ExporterUnavailable {
                reason: e.to_string(),
            }),
            Err(_) => Err(TelemetryError::ExporterUnavailable {
                reason: format!(
                    "flush did not complete within {:?}; buffered spans dropped",
                    self.inner.flush_timeout
                ),
            }),
        }
    }
}

fn wait_for_flush<T>(rx: &mpsc::Receiver<T>, timeout: Duration) -> Result<T, RecvTimeoutError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| rx.recv_timeout(timeout))
        }
        _ => rx.recv_timeout(timeout),
    }
}

/// Shuts the tracer down when dropped.
///
/// Hold it in the scope that owns the process lifetime (normally `main`).
/// Every exit path of that scope, including early returns and unwinding,
/// flushes the tracer exactly once.
#[must_use = "dropping the guard immediately shuts the tracer down"]
#[derive(Debug)]
pub struct ShutdownGuard {
    handle: TracerHandle,
}

impl ShutdownGuard {
    /// Shut down now and report the outcome, instead of waiting for drop.
    pub fn shutdown(self) -> Result<ShutdownOutcome, TelemetryError> {
        self.handle.shutdown()
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if let Err(e) = self.handle.shutdown() {
            tracing::warn!(error = %e, "tracer shutdown degraded");
        }
    }
}

/// Create the process-wide tracer.
///
/// Validates the configuration, resolves the collector endpoint (bounded
/// by `connect_timeout`), builds the OTLP exporter and wraps it in a batch
/// processor so span export never blocks a request.
pub async fn create(
    config: &TracingConfig,
) -> Result<(TracerHandle, ShutdownGuard), TelemetryError> {
    if config.service_name.trim().is_empty() {
        return Err(TelemetryError::configuration("service name must not be empty"));
    }

    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();

    let (provider, endpoint) = if config.export_enabled {
        resolve_endpoint(config).await?;
        let endpoint = config.endpoint_url();
        let exporter = build_exporter(config, &endpoint)?;
        let provider = SdkTracerProvider::builder()
            .with_resource(resource)
            .with_batch_exporter(exporter)
            .build();
        (provider, Some(endpoint))
    } else {
        // No processor: spans are recorded locally and never exported.
        let provider = SdkTracerProvider::builder().with_resource(resource).build();
        (provider, None)
    };

    tracing::info!(
        service = %config.service_name,
        endpoint = endpoint.as_deref().unwrap_or("disabled"),
        protocol = ?config.protocol,
        "tracer created"
    );

    let handle = TracerHandle {
        inner: Arc::new(Inner {
            provider,
            service_name: config.service_name.clone(),
            endpoint,
            granularity: config.granularity,
            flush_timeout: config.flush_timeout,
            shut_down: AtomicBool::new(false),
        }),
    };
    let guard = ShutdownGuard {
        handle: handle.clone(),
    };
    Ok((handle, guard))
}

async fn resolve_endpoint(config: &TracingConfig) -> Result<(), TelemetryError> {
    if config.exporter_port == 0 {
        return Err(TelemetryError::configuration("exporter port must not be 0"));
    }
    let host = config.exporter_host.trim();
    if host.is_empty() {
        return Err(TelemetryError::configuration("exporter host must not be empty"));
    }

    let lookup = tokio::net::lookup_host((host, config.exporter_port));
    match tokio::time::timeout(config.connect_timeout, lookup).await {
        Ok(Ok(mut addrs)) => match addrs.next() {
            Some(_) => Ok(()),
            None => Err(TelemetryError::configuration(format!(
                "exporter host '{host}' resolved to no addresses"
            ))),
        },
        Ok(Err(e)) => Err(TelemetryError::configuration(format!(
            "cannot resolve exporter host '{host}': {e}"
        ))),
        Err(_) => Err(TelemetryError::configuration(format!(
            "resolving exporter host '{host}' timed out after {:?}",
            config.connect_timeout
        ))),
    }
}

fn build_exporter(config: &TracingConfig, endpoint: &str) -> Result<SpanExporter, TelemetryError> {
    let built = match config.protocol {
        ExporterProtocol::Http => SpanExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(endpoint)
            .with_timeout(config.export_timeout)
            .build(),
        ExporterProtocol::Grpc => SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .with_timeout(config.export_timeout)
            .build(),
    };
    built.map_err(|e| TelemetryError::ExporterBuild {
        reason: e.to_string(),
    })
}
