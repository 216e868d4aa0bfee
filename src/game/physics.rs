//! Arena geometry, movement constraints and collision checks

use serde::Serialize;

/// Play-field width
pub const FIELD_WIDTH: f32 = 600.0;
/// Play-field height
pub const FIELD_HEIGHT: f32 = 400.0;
/// Effective radius of a player avatar
pub const PLAYER_RADIUS: f32 = 15.0;
/// Radius of a red ball
pub const BALL_RADIUS: f32 = 10.0;
/// Distance under which a player collects a ball
pub const COLLECT_DISTANCE: f32 = PLAYER_RADIUS + BALL_RADIUS;

/// A position on the field
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Result of bouncing one axis against the field walls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBounce {
    pub pos: f32,
    pub vel: f32,
    pub bounced: bool,
}

/// Stateless physics helpers shared by input handling and the tick loop
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Clamp a point so a circle of `radius` stays inside the field
    pub fn clamp_to_field(point: Point, radius: f32) -> Point {
        Point {
            x: point.x.clamp(radius, FIELD_WIDTH - radius),
            y: point.y.clamp(radius, FIELD_HEIGHT - radius),
        }
    }

    /// Move a player by a client delta, keeping it on the field
    pub fn move_player(position: Point, dx: f32, dy: f32) -> Point {
        Self::clamp_to_field(Point::new(position.x + dx, position.y + dy), PLAYER_RADIUS)
    }

    /// Advance one axis and reflect it off the walls.
    ///
    /// Touching or crossing a wall flips the velocity sign and pins the
    /// position to the wall. Speed is unchanged.
    pub fn bounce_axis(pos: f32, vel: f32, radius: f32, extent: f32) -> AxisBounce {
        let next = pos + vel;
        let (low, high) = (radius, extent - radius);
        if next <= low || next >= high {
            AxisBounce {
                pos: next.clamp(low, high),
                vel: -vel,
                bounced: true,
            }
        } else {
            AxisBounce {
                pos: next,
                vel,
                bounced: false,
            }
        }
    }

    /// Check whether a player at `player` touches a ball at `ball`
    pub fn check_collect(player: &Point, ball: &Point) -> bool {
        player.distance(ball) < COLLECT_DISTANCE
    }
}
