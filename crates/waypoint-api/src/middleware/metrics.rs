//! # Prometheus Metrics
//!
//! Request metrics go through the `metrics` facade; the Prometheus
//! exporter renders them at `GET /metrics`.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `http_requests_total` | counter | `method`, `status` |
//! | `http_request_duration_seconds` | histogram | `method` |
//!
//! Without an installed recorder the middleware still runs and the
//! measurements are discarded.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const REQUEST_DURATION: &str = "http_request_duration_seconds";

/// Install the process-wide Prometheus recorder. Call once, from `main`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    Ok(handle)
}

fn describe() {
    metrics::describe_counter!(REQUESTS_TOTAL, "HTTP requests served, by method and status");
    metrics::describe_histogram!(
        REQUEST_DURATION,
        metrics::Unit::Seconds,
        "HTTP request latency, by method"
    );
}

/// Middleware that counts requests and records their latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(REQUESTS_TOTAL, "method" => method.clone(), "status" => status).increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method)
        .record(started.elapsed().as_secs_f64());

    response
}

/// `GET /metrics` rendering `handle` in the Prometheus text format.
pub fn router<S>(handle: PrometheusHandle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn requests_are_counted_by_method_and_status() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _local = metrics::set_default_local_recorder(&recorder);

        let app = Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route("/boom", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .layer(from_fn(metrics_middleware))
            .merge(router(handle.clone()));

        for uri in ["/ok", "/ok", "/boom"] {
            app.clone()
                .oneshot(axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
        }

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains(r#"http_requests_total{method="GET",status="200"} 2"#));
        assert!(text.contains(r#"http_requests_total{method="GET",status="500"} 1"#));
        assert!(text.contains("http_request_duration_seconds"));
    }
}
