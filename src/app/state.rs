//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{RoomStore, SimulationEngine};
use crate::matchmaking::MatchmakingService;
use crate::ws::registry::ConnectionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub connections: Arc<ConnectionRegistry>,
    pub rooms: Arc<RoomStore>,
    pub matchmaking: Arc<MatchmakingService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        // Transport-side registry, shared by everything that sends
        let connections = Arc::new(ConnectionRegistry::new());

        let rooms = Arc::new(RoomStore::new(connections.clone()));
        let matchmaking = Arc::new(MatchmakingService::new(connections.clone()));

        Self {
            config,
            connections,
            rooms,
            matchmaking,
        }
    }

    /// Simulation loop over this state's rooms
    pub fn simulation(&self) -> SimulationEngine {
        SimulationEngine::new(self.rooms.clone(), self.connections.clone())
    }
}
