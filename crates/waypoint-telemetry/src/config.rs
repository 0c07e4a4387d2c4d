//! # Telemetry Configuration
//!
//! Plain data; loading from the environment is the binary's job.

use std::str::FromStr;
use std::time::Duration;

/// Wire protocol used to ship spans to the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExporterProtocol {
    /// OTLP over HTTP with protobuf bodies (collector port 4318).
    #[default]
    Http,
    /// OTLP over gRPC (collector port 4317).
    Grpc,
}

impl FromStr for ExporterProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "http/protobuf" => Ok(Self::Http),
            "grpc" => Ok(Self::Grpc),
            other => Err(format!("unknown exporter protocol '{other}' (expected http or grpc)")),
        }
    }
}

/// Which layers open spans.
///
/// Service operations are always traced. `Repository` adds a child span
/// around every repository call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanGranularity {
    #[default]
    Service,
    Repository,
}

impl SpanGranularity {
    pub fn traces_repository(&self) -> bool {
        matches!(self, Self::Repository)
    }
}

impl FromStr for SpanGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "service" => Ok(Self::Service),
            "repository" => Ok(Self::Repository),
            other => Err(format!(
                "unknown span granularity '{other}' (expected service or repository)"
            )),
        }
    }
}

/// Tracer configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `service.name` resource attribute. Must not be empty.
    pub service_name: String,
    /// Collector host.
    pub exporter_host: String,
    /// Collector port.
    pub exporter_port: u16,
    pub protocol: ExporterProtocol,
    /// When false, spans are created but never exported and the endpoint
    /// is not resolved.
    pub export_enabled: bool,
    /// Upper bound on resolving the collector endpoint at creation.
    pub connect_timeout: Duration,
    /// Upper bound on a single export call.
    pub export_timeout: Duration,
    /// Upper bound on the final flush at shutdown. Spans still buffered
    /// when it elapses are dropped.
    pub flush_timeout: Duration,
    pub granularity: SpanGranularity,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "waypoint".to_string(),
            exporter_host: "localhost".to_string(),
            exporter_port: 4318,
            protocol: ExporterProtocol::Http,
            export_enabled: true,
            connect_timeout: Duration::from_secs(3),
            export_timeout: Duration::from_secs(10),
            flush_timeout: Duration::from_secs(5),
            granularity: SpanGranularity::Service,
        }
    }
}

impl TracingConfig {
    /// Collector URL for the configured protocol.
    pub fn endpoint_url(&self) -> String {
        match self.protocol {
            ExporterProtocol::Http => format!(
                "http://{}:{}/v1/traces",
                self.exporter_host, self.exporter_port
            ),
            ExporterProtocol::Grpc => {
                format!("http://{}:{}", self.exporter_host, self.exporter_port)
            }
        }
    }
}

/// Output format of the local log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected pretty or json)")),
        }
    }
}

/// Local log stream configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_filter: "info".to_string(),
        }
    }
}
