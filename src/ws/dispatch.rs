//! Routes decoded client messages to matchmaking and the room store

use tracing::debug;

use crate::app::AppState;
use crate::game::{ConnectionId, RoomError, RoomId};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Apply one client message. Out-of-context messages are dropped.
pub fn handle_client_msg(state: &AppState, connection_id: ConnectionId, msg: ClientMsg) {
    match msg {
        ClientMsg::FindMatch { username } => {
            state.matchmaking.request_match(connection_id, username);
        }
        ClientMsg::JoinRoom {
            room,
            username,
            persistent_id,
        } => {
            handle_join(state, connection_id, room, username, persistent_id);
        }
        ClientMsg::PlayerInput { room, input } => {
            if let Err(e) = state.rooms.apply_input(&room, &connection_id, input.dx, input.dy) {
                log_dropped(&connection_id, &room, &e);
            }
        }
        ClientMsg::PlayerLeft { room } => {
            handle_leave(state, connection_id, room);
        }
    }
}

/// Tear down everything a closed connection owned
pub fn handle_disconnect(state: &AppState, connection_id: ConnectionId) {
    state.matchmaking.on_disconnect(&connection_id);

    let rooms = state.connections.unregister(&connection_id);
    for room in rooms {
        state.rooms.remove_connection(&room, &connection_id);
    }
}

fn handle_join(
    state: &AppState,
    connection_id: ConnectionId,
    room: RoomId,
    username: Option<String>,
    persistent_id: Option<String>,
) {
    // The store enrolls the joiner in the room's group once it holds a seat
    if let Err(e) = state.rooms.join_room(
        &room,
        connection_id,
        username.as_deref(),
        persistent_id.as_deref(),
    ) {
        // Matchmaking may have enrolled it already
        state.connections.leave_group(&room, &connection_id);
        log_dropped(&connection_id, &room, &e);
    }
}

fn handle_leave(state: &AppState, connection_id: ConnectionId, room: RoomId) {
    let seated = state
        .rooms
        .get(&room)
        .is_some_and(|handle| handle.lock().has_player(&connection_id));

    state.connections.leave_group(&room, &connection_id);

    if !seated {
        debug!(connection_id = %connection_id, room_id = %room, "player-left for a room not joined");
        return;
    }

    state.rooms.remove_connection(&room, &connection_id);
    state
        .connections
        .send_to(&connection_id, ServerMsg::SelfDisconnected);
}

fn log_dropped(connection_id: &ConnectionId, room: &RoomId, error: &RoomError) {
    debug!(
        connection_id = %connection_id,
        room_id = %room,
        error = %error,
        "Dropped client message"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::ball::BALL_COUNT;
    use crate::game::player::PlayerColor;
    use crate::ws::protocol::MoveInput;
    use tokio::sync::mpsc;

    struct Client {
        id: ConnectionId,
        rx: mpsc::Receiver<ServerMsg>,
    }

    impl Client {
        fn connect(state: &AppState) -> Self {
            let id = ConnectionId::new();
            let rx = state.connections.register(id);
            Self { id, rx }
        }

        fn send(&self, state: &AppState, msg: ClientMsg) {
            handle_client_msg(state, self.id, msg);
        }

        fn drain(&mut self) -> Vec<ServerMsg> {
            let mut out = Vec::new();
            while let Ok(msg) = self.rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    fn find_match() -> ClientMsg {
        ClientMsg::FindMatch { username: None }
    }

    fn join(room: &RoomId, name: &str, persistent_id: Option<&str>) -> ClientMsg {
        ClientMsg::JoinRoom {
            room: room.clone(),
            username: Some(name.to_string()),
            persistent_id: persistent_id.map(str::to_string),
        }
    }

    fn matched_room(msgs: &[ServerMsg]) -> RoomId {
        match msgs {
            [ServerMsg::MatchFound { room }] => room.clone(),
            other => panic!("expected match-found, got {other:?}"),
        }
    }

    /// Pair two clients through matchmaking and seat both in the room
    fn start_match(state: &AppState) -> (Client, Client, RoomId) {
        let mut a = Client::connect(state);
        let mut b = Client::connect(state);
        a.send(state, find_match());
        b.send(state, find_match());
        let room = matched_room(&a.drain());
        assert_eq!(matched_room(&b.drain()), room);

        a.send(state, join(&room, "ada", Some("ada-token")));
        b.send(state, join(&room, "bob", Some("bob-token")));
        (a, b, room)
    }

    #[test]
    fn find_match_then_join_starts_the_game() {
        let state = AppState::new(Config::default());
        let (mut a, mut b, room) = start_match(&state);

        let msgs_a = a.drain();
        assert!(matches!(
            msgs_a[0],
            ServerMsg::PlayerInfo { id, color: PlayerColor::Blue } if id == a.id
        ));
        let msgs_b = b.drain();
        assert!(matches!(
            msgs_b[0],
            ServerMsg::PlayerInfo { id, color: PlayerColor::Green } if id == b.id
        ));

        for msgs in [&msgs_a, &msgs_b] {
            match &msgs[1] {
                ServerMsg::StartGame(arena) => {
                    assert_eq!(arena.players.len(), 2);
                    assert_eq!(arena.red_balls.len(), BALL_COUNT);
                    assert_eq!(arena.usernames[&a.id], "ada");
                }
                other => panic!("expected start-game, got {other:?}"),
            }
        }
        assert_eq!(state.rooms.active_rooms(), 1);
        assert!(state.rooms.get(&room).is_some());
    }

    #[test]
    fn input_is_broadcast_to_both_players() {
        let state = AppState::new(Config::default());
        let (mut a, mut b, room) = start_match(&state);
        a.drain();
        b.drain();

        a.send(
            &state,
            ClientMsg::PlayerInput {
                room: room.clone(),
                input: MoveInput { dx: 3.0, dy: 4.0 },
            },
        );

        let mover = a.id;
        for client in [&mut a, &mut b] {
            let msgs = client.drain();
            let [ServerMsg::StateUpdate(arena)] = &msgs[..] else {
                panic!("expected one state-update, got {msgs:?}");
            };
            let moved = &arena.players[&mover];
            assert_eq!((moved.x, moved.y), (103.0, 204.0));
        }
    }

    #[test]
    fn input_for_foreign_room_is_silently_dropped() {
        let state = AppState::new(Config::default());
        let (mut a, mut b, room) = start_match(&state);
        let mut outsider = Client::connect(&state);
        a.drain();
        b.drain();

        outsider.send(
            &state,
            ClientMsg::PlayerInput {
                room: room.clone(),
                input: MoveInput { dx: 1.0, dy: 1.0 },
            },
        );
        outsider.send(
            &state,
            ClientMsg::PlayerInput {
                room: RoomId::from("room-missing"),
                input: MoveInput { dx: 1.0, dy: 1.0 },
            },
        );

        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());
        assert!(outsider.drain().is_empty());
    }

    #[test]
    fn disconnect_notifies_opponent_and_room_dies_with_last_player() {
        let state = AppState::new(Config::default());
        let (a, mut b, room) = start_match(&state);
        b.drain();

        handle_disconnect(&state, a.id);
        assert!(matches!(&b.drain()[..], [ServerMsg::OpponentLeft]));
        assert_eq!(state.rooms.total_players(), 1);

        handle_disconnect(&state, b.id);
        assert!(state.rooms.get(&room).is_none());
        assert_eq!(state.rooms.active_rooms(), 0);
        assert_eq!(state.connections.connection_count(), 0);
    }

    #[test]
    fn player_left_acknowledges_and_notifies() {
        let state = AppState::new(Config::default());
        let (mut a, mut b, room) = start_match(&state);
        a.drain();
        b.drain();

        a.send(&state, ClientMsg::PlayerLeft { room: room.clone() });
        assert!(matches!(&a.drain()[..], [ServerMsg::SelfDisconnected]));
        assert!(matches!(&b.drain()[..], [ServerMsg::OpponentLeft]));

        // a is out of the group, so b's moves no longer reach it
        b.send(
            &state,
            ClientMsg::PlayerInput {
                room: room.clone(),
                input: MoveInput { dx: 1.0, dy: 0.0 },
            },
        );
        assert!(a.drain().is_empty());
        assert_eq!(b.drain().len(), 1);
    }

    #[test]
    fn player_left_for_unjoined_room_does_nothing() {
        let state = AppState::new(Config::default());
        let mut a = Client::connect(&state);
        a.send(
            &state,
            ClientMsg::PlayerLeft {
                room: RoomId::from("room-none"),
            },
        );
        assert!(a.drain().is_empty());
    }

    #[test]
    fn waiting_player_disconnect_clears_matchmaking() {
        let state = AppState::new(Config::default());
        let mut a = Client::connect(&state);
        let mut b = Client::connect(&state);

        a.send(&state, find_match());
        handle_disconnect(&state, a.id);
        assert!(!state.matchmaking.is_waiting());

        b.send(&state, find_match());
        assert!(b.drain().is_empty());
        assert!(a.drain().is_empty());
    }

    #[test]
    fn reconnecting_client_keeps_color_and_score() {
        let state = AppState::new(Config::default());
        let (_a, b, room) = start_match(&state);

        // bob's tab reloads: the new socket joins before the old one closes
        let mut b2 = Client::connect(&state);
        b2.send(&state, join(&room, "bob", Some("bob-token")));
        let msgs = b2.drain();
        assert!(matches!(
            msgs[0],
            ServerMsg::PlayerInfo { id, color: PlayerColor::Green } if id == b2.id
        ));

        handle_disconnect(&state, b.id);
        let handle = state.rooms.get(&room).unwrap();
        let room = handle.lock();
        assert_eq!(room.player_count(), 2);
        assert!(room.has_player(&b2.id));
        assert!(!room.has_player(&b.id));
    }

    #[test]
    fn third_client_cannot_take_a_seat() {
        let state = AppState::new(Config::default());
        let (mut a, _b, room) = start_match(&state);
        a.drain();

        let mut c = Client::connect(&state);
        c.send(&state, join(&room, "cy", None));
        assert!(c.drain().is_empty());
        assert!(a.drain().is_empty());
        assert!(!state.connections.group_members(&room).contains(&c.id));
    }
}
