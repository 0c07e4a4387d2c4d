//! # Service Bootstrap
//!
//! Startup wiring, in dependency order:
//!
//! 1. **Storage**: the Postgres pool (migrations applied) when a database
//!    is configured, otherwise the in-memory store behind a connection gate.
//! 2. **Repository**: wrapped in [`TracedRepository`] when span
//!    granularity is `repository`.
//! 3. **Service**: [`PlayerService`] with the request deadline.
//!
//! [`serve`] then runs the listener until the shutdown signal, drains
//! in-flight requests for at most the grace period, and returns so the
//! caller can close storage and flush the tracer.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use waypoint_core::Player;
use waypoint_store::{
    ConnectionGate, MemoryRepository, PgPlayerRepository, Repository, SqlClient, StoreError,
    TracedRepository,
};
use waypoint_telemetry::SpanGranularity;

use crate::config::AppConfig;
use crate::registrar::RegistrarError;
use crate::service::PlayerService;
use crate::state::AppState;

/// Concurrent calls admitted by the in-memory store.
const MEMORY_MAX_CONNS: usize = 10;
/// Queue wait before the in-memory store reports exhaustion.
const MEMORY_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors during startup or serving.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("storage initialisation failed: {0}")]
    Store(#[from] StoreError),

    #[error("route registration failed: {0}")]
    Registrar(#[from] RegistrarError),

    #[error("metrics recorder: {0}")]
    Metrics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server task failed: {0}")]
    Server(String),
}

/// The storage backend behind the repository, kept so it can be closed
/// after requests drain.
#[derive(Debug, Clone)]
pub enum Storage {
    Postgres(SqlClient),
    Memory(ConnectionGate),
}

impl Storage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Memory(_) => "memory",
        }
    }

    /// Stop handing out connections and release the pool.
    pub async fn close(&self) {
        match self {
            Self::Postgres(client) => client.close().await,
            Self::Memory(gate) => {
                gate.close();
                tracing::info!("memory store closed");
            }
        }
    }
}

fn with_granularity<R>(repo: R, granularity: SpanGranularity) -> Arc<dyn Repository<Player>>
where
    R: Repository<Player> + 'static,
{
    if granularity.traces_repository() {
        Arc::new(TracedRepository::new(repo))
    } else {
        Arc::new(repo)
    }
}

/// Build application state and the storage handle from `config`.
pub async fn bootstrap(config: &AppConfig) -> Result<(AppState, Storage), BootstrapError> {
    let granularity = config.tracing.granularity;

    let (repo, storage) = match &config.database {
        Some(db) => {
            let client = SqlClient::connect(db).await?;
            client.migrate().await?;
            let repo = PgPlayerRepository::new(client.clone());
            (with_granularity(repo, granularity), Storage::Postgres(client))
        }
        None => {
            tracing::warn!("POSTGRES_HOST not set; using the in-memory store");
            let gate = ConnectionGate::new(MEMORY_MAX_CONNS, MEMORY_WAIT_TIMEOUT);
            let repo = MemoryRepository::<Player>::new(gate.clone());
            (with_granularity(repo, granularity), Storage::Memory(gate))
        }
    };

    let players = PlayerService::new(repo).with_deadline(config.request_timeout);

    tracing::info!(
        service = %config.app_name,
        version = %config.version,
        storage = storage.kind(),
        granularity = ?granularity,
        "bootstrap complete"
    );

    Ok((AppState::new(players), storage))
}

/// Serve `app` until `signal` resolves, then drain in-flight requests for
/// at most `grace`. Connections still open after that are dropped.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    grace: Duration,
    signal: F,
) -> Result<(), BootstrapError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let draining = Arc::new(Notify::new());
    let notify = Arc::clone(&draining);

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        signal.await;
        notify.notify_one();
    });
    let mut server = tokio::spawn(async move { server.await });

    let joined = tokio::select! {
        joined = &mut server => joined,
        _ = draining.notified() => {
            tracing::info!(grace_ms = grace.as_millis() as u64, "draining in-flight requests");
            match tokio::time::timeout(grace, &mut server).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("grace period elapsed; dropping remaining connections");
                    server.abort();
                    return Ok(());
                }
            }
        }
    };

    joined
        .map_err(|e| BootstrapError::Server(e.to_string()))?
        .map_err(BootstrapError::from)
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| {
            vars.iter()
                .find(|(k, _)| k == var)
                .map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[tokio::test]
    async fn memory_backend_without_database() {
        let (state, storage) = bootstrap(&config(&[])).await.unwrap();
        assert_eq!(storage.kind(), "memory");
        state.players.ready().await.unwrap();

        storage.close().await;
        assert!(state.players.ready().await.is_err());
    }

    #[tokio::test]
    async fn serve_returns_after_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let app = Router::new().route("/", get(|| async { "ok" }));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve(listener, app, Duration::from_secs(1), async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
