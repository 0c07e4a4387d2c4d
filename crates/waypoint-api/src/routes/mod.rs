//! # API Route Modules
//!
//! - `players`: player CRUD, registered through the
//!   [`ApiRegistrar`](crate::registrar::ApiRegistrar) under the versioned
//!   prefix and protected by the auth middleware.
//! - `health`: liveness and readiness probes, mounted outside the prefix
//!   and reachable without credentials.

pub mod health;
pub mod players;

use crate::registrar::{ApiRegistrar, RegistrarError};
use crate::state::AppState;

/// Register every versioned operation.
pub fn register(registrar: &mut ApiRegistrar<AppState>) -> Result<(), RegistrarError> {
    players::register(registrar)
}
