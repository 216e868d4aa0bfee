//! Red balls: the moving targets players collect

use rand::Rng;
use serde::Serialize;

use super::physics::{PhysicsSystem, Point, BALL_RADIUS, FIELD_HEIGHT, FIELD_WIDTH};
use super::player::Trail;

/// Number of balls in every room
pub const BALL_COUNT: usize = 10;
/// Distance a ball covers per tick
pub const BALL_SPEED: f32 = 2.0;
/// Spawn margin from the field edge
const SPAWN_MARGIN: f32 = 20.0;

#[derive(Debug, Clone, Serialize)]
pub struct RedBall {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub trail: Trail,
}

impl RedBall {
    /// Spawn at a random position with a random heading at `BALL_SPEED`
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let x = rng.gen_range(SPAWN_MARGIN..FIELD_WIDTH - SPAWN_MARGIN);
        let y = rng.gen_range(SPAWN_MARGIN..FIELD_HEIGHT - SPAWN_MARGIN);
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        Self {
            x,
            y,
            vx: angle.cos() * BALL_SPEED,
            vy: angle.sin() * BALL_SPEED,
            trail: Trail::new(),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Advance one tick, reflecting off the walls, and record the trail
    pub fn step(&mut self) {
        let bx = PhysicsSystem::bounce_axis(self.x, self.vx, BALL_RADIUS, FIELD_WIDTH);
        let by = PhysicsSystem::bounce_axis(self.y, self.vy, BALL_RADIUS, FIELD_HEIGHT);
        self.x = bx.pos;
        self.vx = bx.vel;
        self.y = by.pos;
        self.vy = by.vel;
        self.trail.push(self.position());
    }
}
