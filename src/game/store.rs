//! Room store - owns every room and broadcasts after each mutation

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::ws::protocol::ServerMsg;
use crate::ws::registry::ConnectionRegistry;

use super::room::{InputResult, JoinResult, Room};
use super::{ConnectionId, RoomError, RoomId};

/// Handle to one room. All of a room's fields sit behind this one lock.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Registry of all active rooms.
///
/// Creating and deleting a room both happen under the map shard lock, so a
/// join never lands in a room that is being torn down. Locks are always
/// taken map first, room second.
pub struct RoomStore {
    rooms: DashMap<RoomId, RoomHandle>,
    connections: Arc<ConnectionRegistry>,
}

impl RoomStore {
    pub fn new(connections: Arc<ConnectionRegistry>) -> Self {
        Self {
            rooms: DashMap::new(),
            connections,
        }
    }

    pub fn get(&self, id: &RoomId) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    /// Snapshot of every room handle, for the tick loop
    pub fn handles(&self) -> Vec<RoomHandle> {
        self.rooms.iter().map(|r| r.value().clone()).collect()
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.handles().iter().map(|r| r.lock().player_count()).sum()
    }

    /// Join or create a room, enroll the joiner in the room's group,
    /// acknowledge it, and start the game once both seats are filled
    pub fn join_room(
        &self,
        room_id: &RoomId,
        connection_id: ConnectionId,
        username: Option<&str>,
        persistent_id: Option<&str>,
    ) -> Result<JoinResult, RoomError> {
        // Group membership, acknowledgement and start-game all go out under
        // the room lock so no tick can slip a state-update in between
        let result = {
            let entry = self.rooms.entry(room_id.clone()).or_insert_with(|| {
                info!(room_id = %room_id, "Created room");
                Arc::new(Mutex::new(Room::new(room_id.clone(), rand::random())))
            });
            let mut room = entry.value().lock();
            let joined = room.join(connection_id, username, persistent_id);
            if let Ok(joined) = &joined {
                self.connections.join_group(room_id, connection_id);
                self.connections.send_to(
                    &connection_id,
                    ServerMsg::PlayerInfo {
                        id: connection_id,
                        color: joined.color,
                    },
                );
                if joined.full {
                    self.connections
                        .broadcast(room_id, &ServerMsg::StartGame(room.state.clone()));
                }
            }
            joined
        };

        let joined = match result {
            Ok(joined) => joined,
            Err(e) => {
                warn!(room_id = %room_id, connection_id = %connection_id, error = %e, "Join rejected");
                self.drop_if_empty(room_id);
                return Err(e);
            }
        };

        info!(
            room_id = %room_id,
            connection_id = %connection_id,
            color = ?joined.color,
            reconnected = joined.reconnected,
            "Player joined room"
        );

        Ok(joined)
    }

    /// Remove a connection's player, tell the opponent, delete the room
    /// once nobody is left
    pub fn remove_connection(&self, room_id: &RoomId, connection_id: &ConnectionId) {
        let Some(handle) = self.get(room_id) else {
            return;
        };

        let (removed, remaining) = {
            let mut room = handle.lock();
            let removed = room.remove(connection_id).is_some();
            (removed, room.player_count())
        };

        if removed {
            info!(room_id = %room_id, connection_id = %connection_id, remaining, "Player left room");
            if remaining > 0 {
                self.connections.broadcast(room_id, &ServerMsg::OpponentLeft);
            }
        }

        self.drop_if_empty(room_id);
    }

    /// Apply one movement input and broadcast the new state
    pub fn apply_input(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
        dx: f32,
        dy: f32,
    ) -> Result<InputResult, RoomError> {
        let handle = self
            .get(room_id)
            .ok_or_else(|| RoomError::RoomNotFound(room_id.clone()))?;

        let result = {
            let mut room = handle.lock();
            let result = room.apply_input(connection_id, dx, dy)?;
            // Broadcast before unlocking so updates leave in mutation order
            self.connections
                .broadcast(room_id, &ServerMsg::StateUpdate(room.state.clone()));
            result
        };

        if result.collected > 0 {
            debug!(
                room_id = %room_id,
                connection_id = %connection_id,
                collected = result.collected,
                "Red balls collected"
            );
        }

        Ok(result)
    }

    fn drop_if_empty(&self, room_id: &RoomId) {
        if self
            .rooms
            .remove_if(room_id, |_, room| room.lock().is_empty())
            .is_some()
        {
            info!(room_id = %room_id, "Room removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ball::BALL_COUNT;
    use crate::game::player::PlayerColor;
    use crate::game::SimulationEngine;
    use tokio::sync::mpsc;

    fn store() -> (Arc<ConnectionRegistry>, RoomStore) {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = RoomStore::new(registry.clone());
        (registry, store)
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMsg>) -> Vec<ServerMsg> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn connect(
        registry: &ConnectionRegistry,
        room: &RoomId,
    ) -> (ConnectionId, mpsc::Receiver<ServerMsg>) {
        let id = ConnectionId::new();
        let rx = registry.register(id);
        registry.join_group(room, id);
        (id, rx)
    }

    #[test]
    fn join_acknowledges_and_starts_at_two_players() {
        let (registry, store) = store();
        let room = RoomId::from("room-x");
        let (a, mut rx_a) = connect(&registry, &room);
        let (b, mut rx_b) = connect(&registry, &room);

        store.join_room(&room, a, Some("ada"), None).unwrap();
        let msgs = drain(&mut rx_a);
        assert_eq!(msgs.len(), 1);
        assert!(matches!(
            msgs[0],
            ServerMsg::PlayerInfo { id, color: PlayerColor::Blue } if id == a
        ));

        store.join_room(&room, b, Some("bob"), None).unwrap();
        let msgs_b = drain(&mut rx_b);
        assert!(matches!(
            msgs_b[0],
            ServerMsg::PlayerInfo { id, color: PlayerColor::Green } if id == b
        ));
        match &msgs_b[1] {
            ServerMsg::StartGame(state) => {
                assert_eq!(state.players.len(), 2);
                assert_eq!(state.red_balls.len(), BALL_COUNT);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(&drain(&mut rx_a)[..], [ServerMsg::StartGame(_)]));
        assert_eq!(store.total_players(), 2);
    }

    #[test]
    fn rejected_third_joiner_gets_nothing() {
        let (registry, store) = store();
        let room = RoomId::from("room-x");
        let (a, _rx_a) = connect(&registry, &room);
        let (b, _rx_b) = connect(&registry, &room);
        let (c, mut rx_c) = connect(&registry, &room);
        store.join_room(&room, a, None, None).unwrap();
        store.join_room(&room, b, None, None).unwrap();
        drain(&mut rx_c);

        assert_eq!(store.join_room(&room, c, None, None), Err(RoomError::RoomFull));
        assert!(drain(&mut rx_c).is_empty());
        assert_eq!(store.total_players(), 2);
    }

    #[test]
    fn input_broadcasts_state_to_the_room() {
        let (registry, store) = store();
        let room = RoomId::from("room-x");
        let (a, mut rx_a) = connect(&registry, &room);
        let (b, mut rx_b) = connect(&registry, &room);
        store.join_room(&room, a, None, None).unwrap();
        store.join_room(&room, b, None, None).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        store.apply_input(&room, &a, 0.0, -5.0).unwrap();
        for rx in [&mut rx_a, &mut rx_b] {
            match &drain(rx)[..] {
                [ServerMsg::StateUpdate(state)] => assert_eq!(state.players[&a].y, 195.0),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn input_for_missing_room_or_player_is_dropped() {
        let (registry, store) = store();
        let room = RoomId::from("room-x");
        let (a, mut rx_a) = connect(&registry, &room);

        assert_eq!(
            store.apply_input(&room, &a, 1.0, 1.0),
            Err(RoomError::RoomNotFound(room.clone()))
        );

        let (b, _rx_b) = connect(&registry, &room);
        store.join_room(&room, b, None, None).unwrap();
        drain(&mut rx_a);
        assert_eq!(
            store.apply_input(&room, &a, 1.0, 1.0),
            Err(RoomError::PlayerNotFound(a))
        );
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn leaving_notifies_opponent_and_last_leave_deletes_room() {
        let (registry, store) = store();
        let room = RoomId::from("room-x");
        let (a, _rx_a) = connect(&registry, &room);
        let (b, mut rx_b) = connect(&registry, &room);
        store.join_room(&room, a, None, None).unwrap();
        store.join_room(&room, b, None, None).unwrap();
        drain(&mut rx_b);

        registry.unregister(&a);
        store.remove_connection(&room, &a);
        assert!(matches!(&drain(&mut rx_b)[..], [ServerMsg::OpponentLeft]));
        assert_eq!(store.active_rooms(), 1);

        registry.leave_group(&room, &b);
        store.remove_connection(&room, &b);
        assert_eq!(store.active_rooms(), 0);
        assert!(store.get(&room).is_none());
    }

    #[test]
    fn removing_unknown_connection_is_harmless() {
        let (_registry, store) = store();
        let room = RoomId::from("nowhere");
        store.remove_connection(&room, &ConnectionId::new());
        assert_eq!(store.active_rooms(), 0);
    }

    #[test]
    fn reconnect_keeps_color_through_the_store() {
        let (registry, store) = store();
        let room = RoomId::from("room-x");
        let (a, _rx_a) = connect(&registry, &room);
        let (b, _rx_b) = connect(&registry, &room);
        store.join_room(&room, a, None, Some("ada")).unwrap();
        store.join_room(&room, b, None, Some("bob")).unwrap();

        // new socket arrives before the old one's disconnect is processed
        let (b2, mut rx_b2) = connect(&registry, &room);
        let joined = store.join_room(&room, b2, None, Some("bob")).unwrap();
        assert!(joined.reconnected);
        assert_eq!(joined.color, PlayerColor::Green);

        let msgs = drain(&mut rx_b2);
        assert!(matches!(
            msgs[0],
            ServerMsg::PlayerInfo { id, color: PlayerColor::Green } if id == b2
        ));
        assert!(matches!(msgs[1], ServerMsg::StartGame(_)));

        registry.unregister(&b);
        store.remove_connection(&room, &b);
        assert_eq!(store.total_players(), 2);
    }

    #[test]
    fn only_seated_players_join_the_group() {
        let (registry, store) = store();
        let store = Arc::new(store);
        let engine = SimulationEngine::new(store.clone(), registry.clone());
        let room = RoomId::from("room-x");
        let [a, b, c] = [ConnectionId::new(), ConnectionId::new(), ConnectionId::new()];
        let _rx_a = registry.register(a);
        let _rx_b = registry.register(b);
        let mut rx_c = registry.register(c);

        store.join_room(&room, a, None, None).unwrap();
        store.join_room(&room, b, None, None).unwrap();
        assert_eq!(store.join_room(&room, c, None, None), Err(RoomError::RoomFull));

        let mut members = registry.group_members(&room);
        members.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(members, expected);

        engine.tick_all();
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn concurrent_inputs_and_ticks_arrive_in_order() {
        for _ in 0..20 {
            let (registry, store) = store();
            let store = Arc::new(store);
            let engine = SimulationEngine::new(store.clone(), registry.clone());
            let room = RoomId::from("room-race");
            let a = ConnectionId::new();
            let mut rx = registry.register(a);
            store.join_room(&room, a, None, None).unwrap();
            drain(&mut rx);

            std::thread::scope(|s| {
                s.spawn(|| {
                    for _ in 0..100 {
                        store.apply_input(&room, &a, 0.5, 0.0).unwrap();
                    }
                });
                s.spawn(|| {
                    for _ in 0..100 {
                        engine.tick_all();
                    }
                });
            });

            let xs: Vec<f32> = drain(&mut rx)
                .iter()
                .filter_map(|msg| match msg {
                    ServerMsg::StateUpdate(state) => Some(state.players[&a].x),
                    _ => None,
                })
                .collect();
            assert_eq!(xs.len(), 200);
            assert!(
                xs.windows(2).all(|w| w[0] <= w[1]),
                "player x went backwards: {xs:?}"
            );
            assert_eq!(xs.last(), Some(&150.0));
        }
    }
}
