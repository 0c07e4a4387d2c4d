//! # waypoint-api: Binary Entry Point
//!
//! Startup order: configuration, tracer, subscriber, storage, router,
//! listener. Shutdown runs the reverse: drain requests (bounded by
//! `SHUTDOWN_GRACE_MS`), close storage, flush the tracer (bounded by its
//! flush timeout).
//!
//! A configuration or tracer error exits non-zero before the listener is
//! bound.

use std::process::ExitCode;

use tokio::net::TcpListener;
use waypoint_api::bootstrap::{bootstrap, serve, shutdown_signal, BootstrapError};
use waypoint_api::config::AppConfig;
use waypoint_api::middleware::metrics::install_recorder;
use waypoint_api::AppOptions;
use waypoint_telemetry::init_subscriber;

#[tokio::main]
async fn main() -> ExitCode {
    // No subscriber exists yet, so startup failures go to stderr.
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (tracer, tracer_guard) = match waypoint_telemetry::create(&config.tracing).await {
        Ok(created) => created,
        Err(e) => {
            eprintln!("tracer initialisation failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_subscriber(&config.log, Some(&tracer)) {
        eprintln!("subscriber initialisation failed: {e}");
        return ExitCode::FAILURE;
    }

    let code = match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped with an error");
            ExitCode::FAILURE
        }
    };

    match tracer_guard.shutdown() {
        Ok(outcome) => tracing::info!(?outcome, "tracer shut down"),
        Err(e) => tracing::warn!(error = %e, "tracer flush incomplete; buffered spans dropped"),
    }
    code
}

async fn run(config: AppConfig) -> Result<(), BootstrapError> {
    let metrics = if config.metrics_enabled {
        Some(install_recorder().map_err(|e| BootstrapError::Metrics(e.to_string()))?)
    } else {
        None
    };

    let (state, storage) = bootstrap(&config).await?;
    let app = waypoint_api::app(state, AppOptions::from_config(&config, metrics))?;

    let listener = TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        addr = %config.bind_addr(),
        prefix = %format!("/{}/{}", config.app_name, config.version.major()),
        "waypoint API listening"
    );

    let served = serve(listener, app, config.shutdown_grace, shutdown_signal()).await;
    storage.close().await;
    served
}
