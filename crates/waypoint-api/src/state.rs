//! # Application State
//!
//! Shared state passed to route handlers through the `State` extractor.
//! Everything in it is constructed at startup and cheap to clone.

use crate::service::PlayerService;

#[derive(Debug, Clone)]
pub struct AppState {
    pub players: PlayerService,
}

impl AppState {
    pub fn new(players: PlayerService) -> Self {
        Self { players }
    }
}
