#![deny(missing_docs)]

//! # waypoint-core: Domain Primitives
//!
//! Types every other crate in the workspace agrees on. No I/O, no async,
//! no framework dependencies, only `serde`, `thiserror`, `chrono` and `uuid`.
//!
//! ## Contents
//!
//! - [`Player`] and its write-side companions [`NewPlayer`] and [`PlayerPatch`],
//!   plus the read-side [`PlayerFilter`].
//! - [`PageRequest`] / [`Page`]: finite, restartable offset pagination.
//! - [`ValidationError`]: field-level validation failures.
//!
//! Storage and transport concerns live in `waypoint-store` and `waypoint-api`.

pub mod error;
pub mod pagination;
pub mod player;

pub use error::ValidationError;
pub use pagination::{Page, PageRequest};
pub use player::{NewPlayer, Player, PlayerFilter, PlayerId, PlayerPatch};
