//! Application state shared across routes

use std::sync::Arc;

use dashmap::DashMap;

use crate::game::GameHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Channel into the simulation loop
    pub game: GameHandle,
    /// Live connections: player id -> connect time (unix millis)
    pub connections: Arc<DashMap<String, u64>>,
}

impl AppState {
    pub fn new(game: GameHandle) -> Self {
        Self {
            game,
            connections: Arc::new(DashMap::new()),
        }
    }
}
