//! # Request/Response Tracing
//!
//! Configures `tower_http::trace::TraceLayer` so every request gets one
//! span carrying method, path and response status. When the caller sent a
//! `traceparent` header the span joins the caller's trace.
//!
//! Service spans open under this span, so for a rejected request it is
//! the only span recorded.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
use waypoint_telemetry::attach_remote_parent;

/// Opens the request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        // otel.name stays the bare method to keep span names low-cardinality.
        let span = tracing::info_span!(
            "request",
            otel.name = %request.method(),
            otel.kind = "server",
            otel.status_code = tracing::field::Empty,
            http.request.method = %request.method(),
            url.path = %request.uri().path(),
            http.response.status_code = tracing::field::Empty,
        );
        attach_remote_parent(&span, request.headers());
        span
    }
}

/// Records the response status on the request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordStatus;

impl<B> OnResponse<B> for RecordStatus {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status();
        span.record("http.response.status_code", status.as_u16());
        if status.is_server_error() {
            span.record("otel.status_code", "ERROR");
        }
        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "request finished"
        );
    }
}

/// Build the `TraceLayer` used by the application router.
pub fn layer() -> TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    DefaultOnRequest,
    RecordStatus,
> {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(RecordStatus)
}
