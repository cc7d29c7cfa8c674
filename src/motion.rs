//! Bounce physics for the label
//!
//! Pure functions over [`BounceState`]: integrate, clamp to the surface,
//! reflect velocity on the axis that hit, and classify the collision.
//! Nothing here owns a resource; the controller keeps the state.

use glam::Vec2;
use rand::Rng;
use rand::distr::Open01;

/// Extra random speed added per axis at start (px/sec)
const START_SPEED_JITTER: f32 = 50.0;

/// Position (top-left of the label, px) and velocity (px/sec)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BounceState {
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Surface size and measured label size, in px
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
    pub label_width: f32,
    pub label_height: f32,
}

impl Bounds {
    /// Largest allowed top-left coordinate on each axis
    pub fn max_position(&self) -> Vec2 {
        Vec2::new(
            (self.width - self.label_width).max(0.0),
            (self.height - self.label_height).max(0.0),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    None,
    Edge,
    Corner,
}

impl Collision {
    pub fn is_hit(self) -> bool {
        self != Collision::None
    }
}

/// Advance one tick of `dt` seconds.
///
/// Afterwards the position is inside `[0, max_position]` on both axes and
/// any axis that was clamped has its velocity pointing back inside.
pub fn advance(state: BounceState, dt: f32, bounds: &Bounds) -> (BounceState, Collision) {
    let max = bounds.max_position();
    let moved = state.position + state.velocity * dt;

    let (x, vx, hit_x) = bounce_axis(moved.x, state.velocity.x, max.x);
    let (y, vy, hit_y) = bounce_axis(moved.y, state.velocity.y, max.y);

    let collision = match (hit_x, hit_y) {
        (true, true) => Collision::Corner,
        (true, false) | (false, true) => Collision::Edge,
        (false, false) => Collision::None,
    };

    (
        BounceState {
            position: Vec2::new(x, y),
            velocity: Vec2::new(vx, vy),
        },
        collision,
    )
}

fn bounce_axis(pos: f32, vel: f32, max: f32) -> (f32, f32, bool) {
    // Label at least as large as the surface on this axis: pinned, no hits
    if max <= 0.0 {
        return (0.0, vel, false);
    }
    if pos <= 0.0 {
        (0.0, vel.abs(), true)
    } else if pos >= max {
        (max, -vel.abs(), true)
    } else {
        (pos, vel, false)
    }
}

/// Rescale velocity to `speed` keeping its direction.
///
/// A zero (or non-finite) velocity has no direction and is left unchanged.
pub fn rescale_speed(velocity: Vec2, speed: f32) -> Vec2 {
    let current = velocity.length();
    if current == 0.0 || !current.is_finite() {
        return velocity;
    }
    velocity * (speed / current)
}

/// Random placement strictly inside `bounds`, moving diagonally at roughly `speed`
pub fn random_start<R: Rng + ?Sized>(rng: &mut R, bounds: &Bounds, speed: f32) -> BounceState {
    let max = bounds.max_position();
    let position = Vec2::new(interior(rng, max.x), interior(rng, max.y));

    let mut axis_speed = || {
        let magnitude = speed + rng.random::<f32>() * START_SPEED_JITTER;
        if rng.random_bool(0.5) { magnitude } else { -magnitude }
    };
    let velocity = Vec2::new(axis_speed(), axis_speed());

    BounceState { position, velocity }
}

/// Uniform in the open interval `(0, max)`; 0 when the axis has no room
fn interior<R: Rng + ?Sized>(rng: &mut R, max: f32) -> f32 {
    if max <= 0.0 {
        return 0.0;
    }
    let v = rng.sample::<f32, _>(Open01) * max;
    // The product can still round onto an end point
    if v > 0.0 && v < max { v } else { max / 2.0 }
}
