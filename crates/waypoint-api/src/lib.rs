//! # waypoint-api: Authenticated, Traced Player API
//!
//! Binds span-wrapped service operations to versioned HTTP routes. Every
//! business route passes through the auth middleware unless registered as
//! public.
//!
//! ## API Surface
//!
//! | Path                              | Module                  | Auth      |
//! |-----------------------------------|-------------------------|-----------|
//! | `/{service}/{major}/players/*`    | [`routes::players`]     | protected |
//! | `/{service}/openapi.json`         | [`registrar`]           | public    |
//! | `/{service}/routes`               | [`registrar`]           | public    |
//! | `/{service}/api-document`         | [`openapi`]             | public    |
//! | `/health/liveness`, `/health/readiness` | [`routes::health`] | public    |
//! | `/metrics`                        | [`middleware::metrics`] | public    |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → TimeoutLayer → MetricsMiddleware → AuthMiddleware (per route) → Handler
//! ```
//!
//! A rejected request records only the access-log span opened by the
//! trace layer; the handler and its service span never run.

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod registrar;
pub mod routes;
pub mod service;
pub mod state;

use std::time::Duration;

use axum::middleware::from_fn;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;

use crate::auth::Authenticator;
use crate::config::AppConfig;
use crate::openapi::ApiDoc;
use crate::registrar::{ApiRegistrar, ApiVersion, RegistrarError};
use crate::state::AppState;

/// Slack between the service deadline and the transport timeout, so the
/// service reports its own deadline before the connection is cut.
const TIMEOUT_BACKSTOP: Duration = Duration::from_secs(1);

/// Router assembly inputs that do not live in [`AppState`].
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub service: String,
    pub version: ApiVersion,
    /// Published as the API description's server.
    pub server_url: String,
    pub authenticator: Authenticator,
    pub request_timeout: Duration,
    /// Serves `GET /metrics` when present.
    pub metrics: Option<PrometheusHandle>,
}

impl AppOptions {
    pub fn from_config(config: &AppConfig, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            service: config.app_name.clone(),
            version: config.version.clone(),
            server_url: config.server_url(),
            authenticator: config.auth.authenticator(),
            request_timeout: config.request_timeout,
            metrics,
        }
    }
}

/// Assemble the full application router with all routes and middleware.
///
/// Health probes and `/metrics` are mounted outside the versioned prefix
/// and never require credentials.
pub fn app(state: AppState, options: AppOptions) -> Result<Router, RegistrarError> {
    let mut registrar = ApiRegistrar::new(options.service, options.version)?;
    routes::register(&mut registrar)?;
    let api = registrar.build(options.authenticator, ApiDoc::openapi(), &options.server_url);

    let mut router = Router::new().merge(api).merge(routes::health::router());
    if let Some(handle) = options.metrics {
        router = router.merge(middleware::metrics::router(handle));
    }

    Ok(router
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TimeoutLayer::new(options.request_timeout + TIMEOUT_BACKSTOP))
        .layer(middleware::tracing_layer::layer())
        .with_state(state))
}
