//! # waypoint-store: Repository Port
//!
//! Business services talk to storage only through [`Repository`]. This
//! crate provides the port and its implementations:
//!
//! | Type | Backing |
//! |------|---------|
//! | [`PgPlayerRepository`] | Postgres, through the shared [`SqlClient`] pool |
//! | [`MemoryRepository`] | ordered map behind a [`ConnectionGate`] |
//! | [`TracedRepository`] | decorator adding one span per call |
//!
//! ## Connections
//!
//! Every call borrows a connection (or gate slot) and returns it on every
//! exit path. Callers beyond the configured bound queue up to the wait
//! timeout, then fail with [`StoreError::ResourceExhausted`].
//!
//! ## Errors
//!
//! Driver errors are classified into [`StoreError`]; `sqlx` types never
//! appear in this crate's public signatures except on [`SqlClient`].

pub mod entity;
pub mod error;
pub mod gate;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod traced;

pub use entity::Entity;
pub use error::StoreError;
pub use gate::{ConnectionGate, GateLease};
pub use memory::MemoryRepository;
pub use postgres::{PgPlayerRepository, SqlClient, SqlConfig};
pub use repository::Repository;
pub use traced::TracedRepository;
