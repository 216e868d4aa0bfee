//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::player::PlayerColor;
use crate::game::{ArenaState, ConnectionId, RoomId};

/// Movement delta sent with each input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveInput {
    pub dx: f32,
    pub dy: f32,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientMsg {
    /// Enter matchmaking
    #[serde(alias = "queue")]
    FindMatch {
        #[serde(default)]
        username: Option<String>,
    },

    /// Join (or create) a room by name
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room: RoomId,
        #[serde(default)]
        username: Option<String>,
        /// Durable token the client keeps across reconnects
        #[serde(default)]
        persistent_id: Option<String>,
    },

    /// Movement for the current frame
    PlayerInput { room: RoomId, input: MoveInput },

    /// Voluntary exit from a room
    PlayerLeft { room: RoomId },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMsg {
    /// Two seekers were paired into this room
    MatchFound { room: RoomId },

    /// Private acknowledgment of a join
    PlayerInfo {
        id: ConnectionId,
        color: PlayerColor,
    },

    /// Both seats are filled
    StartGame(ArenaState),

    /// Full room state after any mutation
    StateUpdate(ArenaState),

    /// The other player is gone
    OpponentLeft,

    /// Acknowledges the sender's own `player-left`
    SelfDisconnected,
}
