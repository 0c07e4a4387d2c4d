//! W3C trace-context extraction from inbound HTTP headers.
//!
//! The propagator is constructed locally on each call rather than read from
//! the OpenTelemetry global, so tests and the server see the same behavior.

use http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::Context;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Read-only view of an `http::HeaderMap` for OpenTelemetry propagators.
pub struct HeaderExtractor<'a>(pub &'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Remote parent context carried in `traceparent` / `tracestate`.
///
/// Returns an empty context when the headers are absent or malformed.
pub fn extract_remote_context(headers: &HeaderMap) -> Context {
    TraceContextPropagator::new().extract(&HeaderExtractor(headers))
}

/// Make `span` a child of the remote caller's span, if the request carried one.
pub fn attach_remote_parent(span: &Span, headers: &HeaderMap) {
    if headers.contains_key("traceparent") {
        span.set_parent(extract_remote_context(headers));
    }
}
