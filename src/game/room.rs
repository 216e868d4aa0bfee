//! Room state and the rules that mutate it

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use super::ball::{RedBall, BALL_COUNT};
use super::physics::{PhysicsSystem, Point};
use super::player::{Player, PlayerColor};
use super::{ConnectionId, RoomError, RoomId};

/// Players a room seats through the join path
pub const MAX_PLAYERS: usize = 2;
/// Longest display name kept
pub const MAX_USERNAME_LENGTH: usize = 20;
const DEFAULT_USERNAME: &str = "Player";

/// The part of a room clients see, sent whole on every update
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArenaState {
    pub players: HashMap<ConnectionId, Player>,
    pub red_balls: Vec<RedBall>,
    pub scores: HashMap<ConnectionId, u32>,
    pub usernames: HashMap<ConnectionId, String>,
}

/// Outcome of a successful join
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinResult {
    pub color: PlayerColor,
    /// The connection took over a previous connection's player
    pub reconnected: bool,
    /// The room now seats both players
    pub full: bool,
}

/// Outcome of one movement input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputResult {
    pub position: Point,
    pub collected: u32,
}

/// Authoritative state of one room
pub struct Room {
    pub id: RoomId,
    pub state: ArenaState,
    pub tick: u64,
    /// persistent id -> connection currently holding it
    identities: HashMap<String, ConnectionId>,
    /// persistent id -> color it was given, kept for the life of the room
    colors: HashMap<String, PlayerColor>,
    rng: ChaCha8Rng,
}

impl Room {
    pub fn new(id: RoomId, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let red_balls = (0..BALL_COUNT).map(|_| RedBall::spawn(&mut rng)).collect();

        Self {
            id,
            state: ArenaState {
                red_balls,
                ..ArenaState::default()
            },
            tick: 0,
            identities: HashMap::new(),
            colors: HashMap::new(),
            rng,
        }
    }

    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.players.is_empty()
    }

    pub fn has_player(&self, connection_id: &ConnectionId) -> bool {
        self.state.players.contains_key(connection_id)
    }

    /// Seat a connection, or hand it the player its persistent id left behind
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        username: Option<&str>,
        persistent_id: Option<&str>,
    ) -> Result<JoinResult, RoomError> {
        if let Some(player) = self.state.players.get(&connection_id) {
            // Repeated join from the same connection
            return Ok(JoinResult {
                color: player.color,
                reconnected: false,
                full: self.player_count() == MAX_PLAYERS,
            });
        }

        if let Some(pid) = persistent_id {
            let prior = self.identities.get(pid).copied();
            if let Some(prior) = prior.filter(|p| *p != connection_id && self.has_player(p)) {
                let color = self.rebind(prior, connection_id);
                self.identities.insert(pid.to_string(), connection_id);
                return Ok(JoinResult {
                    color,
                    reconnected: true,
                    full: self.player_count() == MAX_PLAYERS,
                });
            }
        }

        if self.player_count() >= MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }

        let remembered = persistent_id.and_then(|pid| self.colors.get(pid).copied());
        let color = remembered
            .filter(|c| !self.color_taken(*c))
            .or_else(|| {
                PlayerColor::ORDER
                    .into_iter()
                    .find(|c| !self.color_taken(*c))
            })
            .ok_or(RoomError::RoomFull)?;

        let name = sanitize_username(username.unwrap_or_default());
        self.state
            .players
            .insert(connection_id, Player::new(color, name.clone()));
        self.state.scores.insert(connection_id, 0);
        self.state.usernames.insert(connection_id, name);

        if let Some(pid) = persistent_id {
            self.identities.insert(pid.to_string(), connection_id);
            self.colors.insert(pid.to_string(), color);
        }

        Ok(JoinResult {
            color,
            reconnected: false,
            full: self.player_count() == MAX_PLAYERS,
        })
    }

    /// Drop everything a connection owns in this room
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Player> {
        let player = self.state.players.remove(connection_id);
        self.state.scores.remove(connection_id);
        self.state.usernames.remove(connection_id);
        self.identities.retain(|_, holder| holder != connection_id);
        player
    }

    /// Move a player and collect every ball it now touches
    pub fn apply_input(
        &mut self,
        connection_id: &ConnectionId,
        dx: f32,
        dy: f32,
    ) -> Result<InputResult, RoomError> {
        if !dx.is_finite() || !dy.is_finite() {
            return Err(RoomError::InvalidInput("non-finite movement delta"));
        }

        let position = self
            .state
            .players
            .get_mut(connection_id)
            .ok_or(RoomError::PlayerNotFound(*connection_id))?
            .apply_move(dx, dy);

        let mut collected = 0;
        for ball in self.state.red_balls.iter_mut() {
            if PhysicsSystem::check_collect(&position, &ball.position()) {
                // The new spot may overlap a player again; that is allowed
                *ball = RedBall::spawn(&mut self.rng);
                collected += 1;
            }
        }

        if collected > 0 {
            *self.state.scores.entry(*connection_id).or_insert(0) += collected;
        }

        Ok(InputResult {
            position,
            collected,
        })
    }

    /// One simulation step: move balls, fade player trails
    pub fn tick(&mut self) {
        self.tick += 1;

        for ball in self.state.red_balls.iter_mut() {
            ball.step();
        }

        for player in self.state.players.values_mut() {
            player.trail.decay();
        }
    }

    /// Move a player, score and name from one connection to another
    fn rebind(&mut self, from: ConnectionId, to: ConnectionId) -> PlayerColor {
        let player = self.state.players.remove(&from);
        let score = self.state.scores.remove(&from).unwrap_or(0);
        let name = self.state.usernames.remove(&from);

        let color = player.as_ref().map(|p| p.color).unwrap_or(PlayerColor::Blue);
        if let Some(player) = player {
            self.state.players.insert(to, player);
        }
        self.state.scores.insert(to, score);
        if let Some(name) = name {
            self.state.usernames.insert(to, name);
        }
        color
    }

    fn color_taken(&self, color: PlayerColor) -> bool {
        self.state.players.values().any(|p| p.color == color)
    }
}

/// Collapse whitespace and bound the length of a display name
pub fn sanitize_username(raw: &str) -> String {
    let cleaned = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return DEFAULT_USERNAME.to_string();
    }
    cleaned.chars().take(MAX_USERNAME_LENGTH).collect()
}
