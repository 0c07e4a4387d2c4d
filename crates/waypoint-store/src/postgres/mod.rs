//! # SQL Connection Manager
//!
//! [`SqlClient`] owns the one process-wide Postgres pool. It is built once
//! at startup and handed to every SQL repository; repositories borrow a
//! connection per call through [`SqlClient::acquire`] and never open their
//! own.
//!
//! ## Pool bounds
//!
//! `max_open_conns` caps concurrent connections. Callers beyond the cap
//! queue inside the pool for `acquire_timeout`, then fail with
//! [`StoreError::ResourceExhausted`]. `max_idle_conns` is the number of
//! connections kept warm.
//!
//! The driver also reports a refused or unreachable server as an acquire
//! timeout, since it retries connecting until the timeout runs out. An
//! acquire timeout therefore only counts as exhaustion when every
//! connection is open and checked out; otherwise it is
//! [`StoreError::Unavailable`].

mod players;

pub use players::PgPlayerRepository;

use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;

use crate::error::StoreError;

/// Postgres connection settings.
///
/// Custom `Debug` redacts the password.
#[derive(Clone)]
pub struct SqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub acquire_timeout: Duration,
}

impl std::fmt::Debug for SqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl SqlConfig {
    fn validate(&self) -> Result<(), StoreError> {
        if self.host.trim().is_empty() {
            return Err(StoreError::Configuration("database host is empty".to_string()));
        }
        if self.max_open_conns == 0 {
            return Err(StoreError::Configuration(
                "max_open_conns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_open_conns)
            .min_connections(self.max_idle_conns.min(self.max_open_conns))
            .acquire_timeout(self.acquire_timeout)
    }
}

/// Shared handle to the Postgres pool. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SqlClient {
    pool: PgPool,
    acquire_timeout: Duration,
}

impl SqlClient {
    /// Open the pool and establish the idle connections.
    pub async fn connect(config: &SqlConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await?;
        tracing::info!(
            host = %config.host,
            database = %config.database,
            max_open = config.max_open_conns,
            max_idle = config.max_idle_conns,
            "connected to PostgreSQL"
        );
        Ok(Self::from_pool(pool, config.acquire_timeout))
    }

    /// Build the pool without connecting. The first query connects.
    pub fn connect_lazy(config: &SqlConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let pool = config
            .pool_options()
            .connect_lazy_with(config.connect_options());
        Ok(Self::from_pool(pool, config.acquire_timeout))
    }

    pub fn from_pool(pool: PgPool, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            acquire_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Borrow a connection. It returns to the pool when dropped.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        self.pool.acquire().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: sqlx::Error) -> StoreError {
        let sqlx::Error::PoolTimedOut = err else {
            return err.into();
        };
        let size = self.pool.size();
        let idle = self.pool.num_idle();
        let max = self.pool.options().get_max_connections();
        if saturated(size, idle, max) {
            tracing::warn!(size, idle, max, "connection pool exhausted");
            StoreError::ResourceExhausted {
                retry_after: self.acquire_timeout,
            }
        } else {
            tracing::warn!(
                size,
                max,
                timeout_ms = self.acquire_timeout.as_millis() as u64,
                "no database connection within acquire timeout"
            );
            StoreError::Unavailable("database unreachable".to_string())
        }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }

    /// Close the pool, waiting for borrowed connections to come back.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("database pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Every permitted connection is open and none is idle.
fn saturated(size: u32, idle: usize, max: u32) -> bool {
    size >= max && idle == 0
}
