//! Player avatars and the position trails they leave behind

use std::collections::VecDeque;

use serde::Serialize;

use super::physics::{PhysicsSystem, Point};

/// Maximum number of positions kept in any trail
pub const TRAIL_CAPACITY: usize = 30;
/// A moving player samples its trail on every Nth input
pub const TRAIL_SAMPLE_EVERY: u64 = 3;

/// Bounded history of recent positions, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trail {
    points: VecDeque<Point>,
}

impl Trail {
    pub fn new() -> Self {
        Self {
            points: VecDeque::with_capacity(TRAIL_CAPACITY),
        }
    }

    /// Append a point, evicting the oldest once full
    pub fn push(&mut self, point: Point) {
        if self.points.len() >= TRAIL_CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Drop the oldest point (trails fade even while idle)
    pub fn decay(&mut self) {
        self.points.pop_front();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }
}

/// The two colors a room hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerColor {
    /// First joiner, spawns left-center
    Blue,
    /// Second joiner, spawns right-center
    Green,
}

impl PlayerColor {
    /// Assignment order for fresh joiners
    pub const ORDER: [PlayerColor; 2] = [PlayerColor::Blue, PlayerColor::Green];

    pub fn spawn_point(self) -> Point {
        match self {
            PlayerColor::Blue => Point::new(100.0, 200.0),
            PlayerColor::Green => Point::new(500.0, 200.0),
        }
    }
}

/// Authoritative player state inside a room
#[derive(Debug, Clone, Serialize)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub color: PlayerColor,
    pub name: String,
    pub trail: Trail,
    #[serde(skip)]
    pub input_ticks: u64,
}

impl Player {
    pub fn new(color: PlayerColor, name: String) -> Self {
        let spawn = color.spawn_point();
        Self {
            x: spawn.x,
            y: spawn.y,
            color,
            name,
            trail: Trail::new(),
            input_ticks: 0,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Apply one movement input. Returns the clamped position.
    pub fn apply_move(&mut self, dx: f32, dy: f32) -> Point {
        self.input_ticks += 1;

        let before = self.position();
        let after = PhysicsSystem::move_player(before, dx, dy);
        self.x = after.x;
        self.y = after.y;

        if after != before && self.input_ticks % TRAIL_SAMPLE_EVERY == 0 {
            self.trail.push(after);
        }

        after
    }
}
