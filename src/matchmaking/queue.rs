//! The single-seat waiting slot

use std::time::{Duration, Instant};

use crate::game::ConnectionId;

/// Connection waiting for an opponent
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub connection_id: ConnectionId,
    pub username: Option<String>,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(connection_id: ConnectionId, username: Option<String>) -> Self {
        Self {
            connection_id,
            username,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Holds at most one waiting player
#[derive(Debug, Default)]
pub struct WaitingSlot {
    occupant: Option<QueuedPlayer>,
}

impl WaitingSlot {
    pub fn new() -> Self {
        Self { occupant: None }
    }

    /// Take the occupant out if it is someone other than `seeker`
    pub fn take_opponent(&mut self, seeker: &ConnectionId) -> Option<QueuedPlayer> {
        let other = self
            .occupant
            .as_ref()
            .is_some_and(|waiting| waiting.connection_id != *seeker);
        if other {
            self.occupant.take()
        } else {
            None
        }
    }

    /// Seat a player, replacing whoever was waiting
    pub fn put(&mut self, player: QueuedPlayer) -> Option<QueuedPlayer> {
        self.occupant.replace(player)
    }

    /// Empty the slot if `connection_id` holds it
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<QueuedPlayer> {
        let held = self
            .occupant
            .as_ref()
            .is_some_and(|waiting| waiting.connection_id == *connection_id);
        if held {
            self.occupant.take()
        } else {
            None
        }
    }

    pub fn occupant(&self) -> Option<&QueuedPlayer> {
        self.occupant.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }
}
