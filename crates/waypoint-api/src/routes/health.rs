//! # Health Probes
//!
//! `GET /health/liveness` answers as long as the process runs.
//! `GET /health/readiness` also requires the store to answer a ping, so a
//! node whose database is unreachable is taken out of rotation.

use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
}

async fn liveness() -> &'static str {
    "ok"
}

async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state.players.ready().await?;
    Ok("ready")
}
