//! # Operation Spans
//!
//! [`OperationSpan`] wraps a `tracing` span whose end is tied to ownership.
//! There is exactly one way to close it with a chosen status,
//! [`OperationSpan::finish`], which consumes the guard. A guard that goes
//! out of scope unfinished closes itself:
//!
//! - dropped while the thread is unwinding → `error` ("panicked")
//! - dropped otherwise (future cancelled, deadline hit) → `cancelled`
//!
//! Status is written to the `otel.status_code` / `otel.status_message`
//! fields understood by `tracing-opentelemetry`, and mirrored in
//! `operation.status` for local log output.

use std::borrow::Cow;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use tracing::field::Empty;
use tracing::{Instrument, Span};

/// Final status of a traced operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    Ok,
    /// The operation failed; the message is exported as the status message.
    Error(String),
    /// The operation was abandoned before it completed.
    Cancelled,
}

impl SpanStatus {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Short label recorded in `operation.status`.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error(_) => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// A span that is closed with a status on every exit path.
#[must_use = "an operation span closes as cancelled when dropped unfinished"]
pub struct OperationSpan {
    span: Span,
    name: Cow<'static, str>,
    started: Instant,
    finished: bool,
}

impl std::fmt::Debug for OperationSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSpan")
            .field("name", &self.name)
            .field("finished", &self.finished)
            .finish()
    }
}

impl OperationSpan {
    /// Start a span under the current span (if any).
    pub fn start(name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        let span = tracing::info_span!(
            "operation",
            otel.name = %name,
            otel.kind = "internal",
            otel.status_code = Empty,
            otel.status_message = Empty,
            operation.name = %name,
            operation.status = Empty,
            operation.elapsed_ms = Empty,
        );
        Self::wrap(span, name)
    }

    /// Start a span under an explicit parent.
    pub fn child_of(parent: &Span, name: impl Into<Cow<'static, str>>) -> Self {
        let name = name.into();
        let span = tracing::info_span!(
            parent: parent,
            "operation",
            otel.name = %name,
            otel.kind = "internal",
            otel.status_code = Empty,
            otel.status_message = Empty,
            operation.name = %name,
            operation.status = Empty,
            operation.elapsed_ms = Empty,
        );
        Self::wrap(span, name)
    }

    fn wrap(span: Span, name: Cow<'static, str>) -> Self {
        Self {
            span,
            name,
            started: Instant::now(),
            finished: false,
        }
    }

    /// The underlying span, for `Instrument::instrument` and child spans.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drive `future` inside this span.
    ///
    /// A panic raised while polling closes the span with `error`
    /// ("panicked") before unwinding continues. Async state is dropped
    /// after the unwind has been caught, so `Drop` alone would see a
    /// cancellation.
    pub async fn watch<F: Future>(&mut self, future: F) -> F::Output {
        let mut future = std::pin::pin!(future.instrument(self.span.clone()));
        std::future::poll_fn(|cx| {
            match std::panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(cx))) {
                Ok(poll) => poll,
                Err(payload) => {
                    self.close(&SpanStatus::error("panicked"));
                    std::panic::resume_unwind(payload)
                }
            }
        })
        .await
    }

    /// Close the span with `status`.
    pub fn finish(mut self, status: SpanStatus) {
        self.close(&status);
    }

    /// Close the span with `Ok` or `Error`, depending on `result`.
    pub fn finish_with<T, E: std::fmt::Display>(self, result: &Result<T, E>) {
        let status = match result {
            Ok(_) => SpanStatus::Ok,
            Err(e) => SpanStatus::error(e.to_string()),
        };
        self.finish(status);
    }

    fn close(&mut self, status: &SpanStatus) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.span.record("operation.elapsed_ms", elapsed_ms);
        self.span.record("operation.status", status.label());
        match status {
            SpanStatus::Ok => {
                self.span.record("otel.status_code", "OK");
            }
            SpanStatus::Error(message) => {
                self.span.record("otel.status_code", "ERROR");
                self.span.record("otel.status_message", message.as_str());
            }
            SpanStatus::Cancelled => {
                self.span.record("otel.status_code", "ERROR");
                self.span.record("otel.status_message", "cancelled");
            }
        }
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let status = if std::thread::panicking() {
            SpanStatus::error("panicked")
        } else {
            SpanStatus::Cancelled
        };
        tracing::debug!(operation = %self.name, status = status.label(), "span closed without finish");
        self.close(&status);
    }
}
