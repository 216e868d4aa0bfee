//! Matchmaking service - pairs seekers two at a time into fresh rooms

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::game::{ConnectionId, RoomId};
use crate::ws::protocol::ServerMsg;
use crate::ws::registry::ConnectionRegistry;

use super::queue::{QueuedPlayer, WaitingSlot};

/// What a `find-match` request led to
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// Paired with the waiting player
    Paired {
        room: RoomId,
        opponent: ConnectionId,
    },
    /// Now the one waiting
    Waiting,
}

/// Matchmaking service
pub struct MatchmakingService {
    slot: Mutex<WaitingSlot>,
    connections: Arc<ConnectionRegistry>,
}

impl MatchmakingService {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            slot: Mutex::new(WaitingSlot::new()),
            connections,
        }
    }

    /// Pair with whoever is waiting, or wait in their place
    pub fn request_match(
        &self,
        connection_id: ConnectionId,
        username: Option<String>,
    ) -> MatchOutcome {
        let opponent = {
            let mut slot = self.slot.lock();
            match slot.take_opponent(&connection_id) {
                Some(waiting) if self.connections.is_live(&waiting.connection_id) => Some(waiting),
                stale => {
                    if let Some(stale) = stale {
                        debug!(connection_id = %stale.connection_id, "Discarding stale waiting player");
                    }
                    slot.put(QueuedPlayer::new(connection_id, username.clone()));
                    None
                }
            }
        };

        let Some(opponent) = opponent else {
            info!(connection_id = %connection_id, "Player waiting for a match");
            return MatchOutcome::Waiting;
        };

        let room = RoomId::generate();
        self.connections.join_group(&room, opponent.connection_id);
        self.connections.join_group(&room, connection_id);
        self.connections
            .broadcast(&room, &ServerMsg::MatchFound { room: room.clone() });

        info!(
            room_id = %room,
            waiting = %opponent.connection_id,
            waiting_name = ?opponent.username,
            seeker = %connection_id,
            seeker_name = ?username,
            waited_ms = opponent.wait_time().as_millis() as u64,
            "Match found"
        );

        MatchOutcome::Paired {
            room,
            opponent: opponent.connection_id,
        }
    }

    /// Forget a disconnected connection if it was waiting
    pub fn on_disconnect(&self, connection_id: &ConnectionId) {
        if self.slot.lock().remove(connection_id).is_some() {
            info!(connection_id = %connection_id, "Waiting player left matchmaking");
        }
    }

    /// Anyone waiting right now
    pub fn is_waiting(&self) -> bool {
        !self.slot.lock().is_empty()
    }
}
