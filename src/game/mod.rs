//! Game simulation modules

pub mod ball;
pub mod physics;
pub mod player;
pub mod room;
pub mod simulation;
pub mod store;

pub use room::{ArenaState, Room};
pub use simulation::SimulationEngine;
pub use store::RoomStore;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one live client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Name of a room, as clients send it back in `join-room`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Fresh room name, independent of the connections it pairs
    pub fn generate() -> Self {
        Self(format!("room-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasons a room operation did nothing
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoomError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Connection {0} has no player in this room")]
    PlayerNotFound(ConnectionId),

    #[error("Room is full")]
    RoomFull,

    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),
}
