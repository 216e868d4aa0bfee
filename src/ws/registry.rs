//! Live connections and the room groups they broadcast to

use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::game::{ConnectionId, RoomId};
use crate::ws::protocol::ServerMsg;

/// Outbound queue depth per connection
pub const OUTBOUND_BUFFER: usize = 256;

/// Outbound half of one client connection
struct Connection {
    sender: mpsc::Sender<ServerMsg>,
    rooms: HashSet<RoomId>,
}

/// Registry of connected clients and room-scoped broadcast groups
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    groups: DashMap<RoomId, HashSet<ConnectionId>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register a connection and get the receiver its writer drains
    pub fn register(&self, id: ConnectionId) -> mpsc::Receiver<ServerMsg> {
        let (sender, receiver) = mpsc::channel(OUTBOUND_BUFFER);
        self.connections.insert(
            id,
            Connection {
                sender,
                rooms: HashSet::new(),
            },
        );
        receiver
    }

    /// Forget a connection. Returns the rooms it had joined.
    pub fn unregister(&self, id: &ConnectionId) -> Vec<RoomId> {
        let rooms: Vec<RoomId> = self
            .connections
            .remove(id)
            .map(|(_, conn)| conn.rooms.into_iter().collect())
            .unwrap_or_default();

        for room in &rooms {
            self.remove_from_group(room, id);
        }
        rooms
    }

    /// Registered and its writer still listening
    pub fn is_live(&self, id: &ConnectionId) -> bool {
        self.connections
            .get(id)
            .map(|conn| !conn.sender.is_closed())
            .unwrap_or(false)
    }

    pub fn join_group(&self, room: &RoomId, id: ConnectionId) {
        match self.connections.get_mut(&id) {
            Some(mut conn) => {
                conn.rooms.insert(room.clone());
            }
            None => return,
        }
        self.groups.entry(room.clone()).or_default().insert(id);
    }

    pub fn leave_group(&self, room: &RoomId, id: &ConnectionId) {
        if let Some(mut conn) = self.connections.get_mut(id) {
            conn.rooms.remove(room);
        }
        self.remove_from_group(room, id);
    }

    pub fn group_members(&self, room: &RoomId) -> Vec<ConnectionId> {
        self.groups
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Queue a message for one connection. Drops it if the queue is full.
    pub fn send_to(&self, id: &ConnectionId, msg: ServerMsg) -> bool {
        let Some(sender) = self.connections.get(id).map(|c| c.sender.clone()) else {
            return false;
        };

        match sender.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(connection_id = %id, "Outbound queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(connection_id = %id, "Outbound queue closed");
                false
            }
        }
    }

    /// Queue a message for every member of a room group
    pub fn broadcast(&self, room: &RoomId, msg: &ServerMsg) -> usize {
        self.group_members(room)
            .iter()
            .filter(|id| self.send_to(id, msg.clone()))
            .count()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn remove_from_group(&self, room: &RoomId, id: &ConnectionId) {
        if let Some(mut members) = self.groups.get_mut(room) {
            members.remove(id);
        }
        self.groups.remove_if(room, |_, members| members.is_empty());
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
