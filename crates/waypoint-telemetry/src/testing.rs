//! Span capture for tests.
//!
//! [`SpanCapture`] is a `tracing_subscriber::Layer` that records, for every
//! span, its operation name, its parent's name, the status written by
//! [`OperationSpan`](crate::OperationSpan), how many times the status was
//! written, and how many times the span closed.
//!
//! ```ignore
//! let capture = SpanCapture::new();
//! let _guard = capture.install();
//! // ... exercise code ...
//! assert_eq!(capture.named("get-player")[0].closes, 1);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::subscriber::DefaultGuard;
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// What was observed about one span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedSpan {
    /// `otel.name` if present, otherwise the static span name.
    pub name: String,
    pub parent: Option<String>,
    /// Last value recorded in `operation.status`.
    pub status: Option<String>,
    /// Last value recorded in `otel.status_message`.
    pub status_message: Option<String>,
    /// Number of times `operation.status` was recorded.
    pub status_records: usize,
    /// Number of close events.
    pub closes: usize,
}

/// Recording layer. Clones share the same record list.
#[derive(Clone, Default)]
pub struct SpanCapture {
    spans: Arc<Mutex<Vec<CapturedSpan>>>,
}

struct Slot(usize);

impl SpanCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a registry with this layer as the thread's default
    /// subscriber until the guard is dropped.
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry().with(self.clone());
        tracing::subscriber::set_default(subscriber)
    }

    /// Every span seen so far, in creation order.
    pub fn spans(&self) -> Vec<CapturedSpan> {
        self.spans.lock().clone()
    }

    /// Spans whose name equals `name`.
    pub fn named(&self, name: &str) -> Vec<CapturedSpan> {
        self.spans
            .lock()
            .iter()
            .filter(|s| s.name == name)
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct FieldVisitor {
    name: Option<String>,
    status: Option<String>,
    status_message: Option<String>,
}

impl FieldVisitor {
    fn store(&mut self, field: &Field, value: String) {
        match field.name() {
            "otel.name" => self.name = Some(value),
            "operation.status" => self.status = Some(value),
            "otel.status_message" => self.status_message = Some(value),
            _ => {}
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.store(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.store(field, format!("{value:?}"));
    }
}

impl<S> Layer<S> for SpanCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);

        let parent = span.parent().and_then(|p| {
            let ext = p.extensions();
            let slot = ext.get::<Slot>()?;
            self.spans.lock().get(slot.0).map(|s| s.name.clone())
        });

        let mut spans = self.spans.lock();
        let index = spans.len();
        spans.push(CapturedSpan {
            name: visitor
                .name
                .unwrap_or_else(|| span.metadata().name().to_string()),
            parent,
            status: visitor.status,
            status_message: visitor.status_message,
            status_records: 0,
            closes: 0,
        });
        drop(spans);
        span.extensions_mut().insert(Slot(index));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let ext = span.extensions();
        let Some(slot) = ext.get::<Slot>() else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);

        let mut spans = self.spans.lock();
        if let Some(captured) = spans.get_mut(slot.0) {
            if let Some(status) = visitor.status {
                captured.status = Some(status);
                captured.status_records += 1;
            }
            if let Some(message) = visitor.status_message {
                captured.status_message = Some(message);
            }
        }
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(&id) else {
            return;
        };
        let ext = span.extensions();
        if let Some(slot) = ext.get::<Slot>() {
            if let Some(captured) = self.spans.lock().get_mut(slot.0) {
                captured.closes += 1;
            }
        }
    }
}
