//! Physics engines: the integrating [`BasicPhysicsEngine`] and the inert
//! [`NullPhysicsEngine`] used by static bodies and decorators.
//!
//! Every mutation follows the same shape: read the current state, compute a
//! new one, publish it through the body's [`PhysicsBuffer`]. Engines take
//! `&self` so a tick worker can drive them through a shared reference.
//!
//! # Example
//!
//! ```
//! use stardrift_core::physics::*;
//!
//! let mut start = PhysicsState::at(10.0, 10.0, 4.0);
//! start.speed_x = 2.0;
//! let engine = BasicPhysicsEngine::new(start, Damping::none(), 0.5);
//!
//! let next = engine.calc_new_physics_values(1_000_000_000);
//! engine.set_physics_values(next);
//!
//! assert!((engine.current().pos_x - 12.0).abs() < 1e-9);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::buffer::PhysicsBuffer;
use super::state::PhysicsState;
use super::WorldBounds;

/// Distance a rebounding body is placed inside the crossed edge.
pub const REBOUND_EPSILON: f64 = 0.0001;

// ---------------------------------------------------------------------------
// Damping
// ---------------------------------------------------------------------------

/// Per-second velocity retention factors.
///
/// After `dt` seconds the velocity is multiplied by `factor.powf(dt)`, where
/// the factor depends on whether the body is being accelerated. A factor of
/// `1.0` disables drag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Damping {
    /// Retention while acceleration or thrust is non-zero.
    pub accelerating: f64,
    /// Retention while coasting.
    pub coasting: f64,
}

impl Damping {
    /// No drag at all; motion follows exact kinematics.
    pub const fn none() -> Self {
        Self {
            accelerating: 1.0,
            coasting: 1.0,
        }
    }

    /// Light, constant drag for projectiles.
    pub const fn projectile() -> Self {
        Self {
            accelerating: 0.98,
            coasting: 0.98,
        }
    }

    /// Ships and rocks: moderate drag under power, heavy drag when coasting.
    pub const fn vehicle() -> Self {
        Self {
            accelerating: 0.35,
            coasting: 0.0001,
        }
    }

    fn factor(&self, accelerating: bool, dt: f64) -> f64 {
        let base = if accelerating {
            self.accelerating
        } else {
            self.coasting
        };
        base.powf(dt)
    }
}

impl Default for Damping {
    fn default() -> Self {
        Self::none()
    }
}

// ---------------------------------------------------------------------------
// PhysicsEngine
// ---------------------------------------------------------------------------

/// Integrates and mutates a body's [`PhysicsState`].
///
/// The setter methods all read the current state, change one aspect and
/// publish the result. Inert engines override them as no-ops.
pub trait PhysicsEngine: Send + Sync + fmt::Debug {
    /// The body's state buffer.
    fn buffer(&self) -> &PhysicsBuffer;

    /// Compute the state at `now_ns` without publishing it.
    fn calc_new_physics_values(&self, now_ns: u64) -> PhysicsState;

    /// Push back from the east edge (`x >= width`).
    fn rebound_in_east(&self, bounds: &WorldBounds);
    /// Push back from the west edge (`x < 0`).
    fn rebound_in_west(&self, bounds: &WorldBounds);
    /// Push back from the north edge (`y < 0`).
    fn rebound_in_north(&self, bounds: &WorldBounds);
    /// Push back from the south edge (`y >= height`).
    fn rebound_in_south(&self, bounds: &WorldBounds);

    /// The last published state.
    fn current(&self) -> PhysicsState {
        self.buffer().current()
    }

    /// Publish `state` as the new current state.
    fn set_physics_values(&self, state: PhysicsState) {
        self.buffer().publish(state);
    }

    /// Move the state's clock to `now_ns` without integrating. Paused bodies
    /// use this so that resuming does not produce a large time delta.
    fn sync_timestamp(&self, now_ns: u64) {
        self.buffer().update(|s| s.timestamp_ns = now_ns);
    }

    fn is_thrusting(&self) -> bool {
        self.current().thrust != 0.0
    }

    fn reset_acceleration(&self) {
        self.buffer().update(|s| {
            s.acc_x = 0.0;
            s.acc_y = 0.0;
        });
    }

    fn set_acceleration(&self, acc_x: f64, acc_y: f64) {
        self.buffer().update(|s| {
            s.acc_x = acc_x;
            s.acc_y = acc_y;
        });
    }

    fn set_thrust(&self, thrust: f64) {
        self.buffer().update(|s| s.thrust = thrust);
    }

    /// Zero both direct acceleration and thrust.
    fn stop_pushing(&self) {
        self.buffer().update(|s| {
            s.acc_x = 0.0;
            s.acc_y = 0.0;
            s.thrust = 0.0;
        });
    }

    fn set_angular_acceleration(&self, angular_acc: f64) {
        self.buffer().update(|s| s.angular_acc = angular_acc);
    }

    fn angular_acceleration_inc(&self, delta: f64) {
        self.buffer().update(|s| s.angular_acc += delta);
    }

    fn set_angular_speed(&self, angular_speed: f64) {
        self.buffer().update(|s| s.angular_speed = angular_speed);
    }

    fn set_angle(&self, angle: f64) {
        self.buffer().update(|s| s.angle = angle.rem_euclid(360.0));
    }
}

// ---------------------------------------------------------------------------
// BasicPhysicsEngine
// ---------------------------------------------------------------------------

/// Uniformly accelerated motion with damping and edge rebounds.
#[derive(Debug)]
pub struct BasicPhysicsEngine {
    buffer: PhysicsBuffer,
    damping: Damping,
    max_dt: f64,
}

impl BasicPhysicsEngine {
    /// Create an engine starting at `initial`. Elapsed time is clamped to
    /// `max_dt` seconds per integration step.
    pub fn new(initial: PhysicsState, damping: Damping, max_dt: f64) -> Self {
        Self {
            buffer: PhysicsBuffer::new(initial),
            damping,
            max_dt,
        }
    }

    pub fn damping(&self) -> Damping {
        self.damping
    }
}

impl PhysicsEngine for BasicPhysicsEngine {
    fn buffer(&self) -> &PhysicsBuffer {
        &self.buffer
    }

    fn calc_new_physics_values(&self, now_ns: u64) -> PhysicsState {
        let old = self.buffer.current();
        let mut dt = old.elapsed_secs(now_ns);
        if dt > self.max_dt {
            warn!(dt, max_dt = self.max_dt, "physics delta clamped");
            dt = self.max_dt;
        }

        let (hx, hy) = old.heading();
        let acc_x = old.acc_x + hx * old.thrust;
        let acc_y = old.acc_y + hy * old.thrust;
        let damp = self.damping.factor(acc_x != 0.0 || acc_y != 0.0, dt);

        let speed_x = old.speed_x * damp + acc_x * dt;
        let speed_y = old.speed_y * damp + acc_y * dt;
        let angular_speed = old.angular_speed + old.angular_acc * dt;

        PhysicsState {
            timestamp_ns: now_ns,
            pos_x: old.pos_x + (old.speed_x + speed_x) * 0.5 * dt,
            pos_y: old.pos_y + (old.speed_y + speed_y) * 0.5 * dt,
            angle: (old.angle + (old.angular_speed + angular_speed) * 0.5 * dt).rem_euclid(360.0),
            speed_x,
            speed_y,
            angular_speed,
            ..old
        }
    }

    fn rebound_in_east(&self, bounds: &WorldBounds) {
        self.buffer.update(|s| {
            s.speed_x = -s.speed_x.abs();
            s.pos_x = bounds.width - REBOUND_EPSILON;
        });
    }

    fn rebound_in_west(&self, _bounds: &WorldBounds) {
        self.buffer.update(|s| {
            s.speed_x = s.speed_x.abs();
            s.pos_x = REBOUND_EPSILON;
        });
    }

    fn rebound_in_north(&self, _bounds: &WorldBounds) {
        self.buffer.update(|s| {
            s.speed_y = s.speed_y.abs();
            s.pos_y = REBOUND_EPSILON;
        });
    }

    fn rebound_in_south(&self, bounds: &WorldBounds) {
        self.buffer.update(|s| {
            s.speed_y = -s.speed_y.abs();
            s.pos_y = bounds.height - REBOUND_EPSILON;
        });
    }
}

// ---------------------------------------------------------------------------
// NullPhysicsEngine
// ---------------------------------------------------------------------------

/// Engine for bodies that never move. Every mutation is ignored and
/// integration returns the current state unchanged.
#[derive(Debug)]
pub struct NullPhysicsEngine {
    buffer: PhysicsBuffer,
}

impl NullPhysicsEngine {
    pub fn new(initial: PhysicsState) -> Self {
        Self {
            buffer: PhysicsBuffer::new(initial),
        }
    }
}

impl PhysicsEngine for NullPhysicsEngine {
    fn buffer(&self) -> &PhysicsBuffer {
        &self.buffer
    }

    fn calc_new_physics_values(&self, _now_ns: u64) -> PhysicsState {
        self.buffer.current()
    }

    fn rebound_in_east(&self, _bounds: &WorldBounds) {}
    fn rebound_in_west(&self, _bounds: &WorldBounds) {}
    fn rebound_in_north(&self, _bounds: &WorldBounds) {}
    fn rebound_in_south(&self, _bounds: &WorldBounds) {}

    fn set_physics_values(&self, _state: PhysicsState) {}
    fn sync_timestamp(&self, _now_ns: u64) {}
    fn reset_acceleration(&self) {}
    fn set_acceleration(&self, _acc_x: f64, _acc_y: f64) {}
    fn set_thrust(&self, _thrust: f64) {}
    fn stop_pushing(&self) {}
    fn set_angular_acceleration(&self, _angular_acc: f64) {}
    fn angular_acceleration_inc(&self, _delta: f64) {}
    fn set_angular_speed(&self, _angular_speed: f64) {}
    fn set_angle(&self, _angle: f64) {}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: u64 = 1_000_000_000;

    fn moving(vx: f64, vy: f64) -> PhysicsState {
        PhysicsState {
            speed_x: vx,
            speed_y: vy,
            ..PhysicsState::at(50.0, 50.0, 10.0)
        }
    }

    #[test]
    fn constant_acceleration_uses_trapezoid() {
        let mut start = moving(0.0, 0.0);
        start.acc_x = 2.0;
        let engine = BasicPhysicsEngine::new(start, Damping::none(), 10.0);
        let s = engine.calc_new_physics_values(SEC);
        // x = x0 + a t^2 / 2
        assert!((s.pos_x - 51.0).abs() < 1e-9);
        assert!((s.speed_x - 2.0).abs() < 1e-9);
        assert_eq!(s.timestamp_ns, SEC);
    }

    #[test]
    fn thrust_follows_heading() {
        let mut start = moving(0.0, 0.0);
        start.angle = 90.0;
        start.thrust = 4.0;
        let engine = BasicPhysicsEngine::new(start, Damping::none(), 10.0);
        let s = engine.calc_new_physics_values(SEC);
        assert!(s.speed_x.abs() < 1e-9);
        assert!((s.speed_y - 4.0).abs() < 1e-9);
        // Thrust is not folded into the stored direct acceleration.
        assert_eq!(s.acc_y, 0.0);
    }

    #[test]
    fn angle_wraps_into_range() {
        let mut start = moving(0.0, 0.0);
        start.angle = 350.0;
        start.angular_speed = 20.0;
        let engine = BasicPhysicsEngine::new(start, Damping::none(), 10.0);
        let s = engine.calc_new_physics_values(SEC);
        assert!((s.angle - 10.0).abs() < 1e-9);
    }

    #[test]
    fn delta_is_clamped() {
        let engine = BasicPhysicsEngine::new(moving(1.0, 0.0), Damping::none(), 0.5);
        let s = engine.calc_new_physics_values(10 * SEC);
        assert!((s.pos_x - 50.5).abs() < 1e-9);
    }

    #[test]
    fn coasting_vehicle_loses_speed() {
        let engine = BasicPhysicsEngine::new(moving(100.0, 0.0), Damping::vehicle(), 0.5);
        let s = engine.calc_new_physics_values(SEC / 10);
        assert!(s.speed_x < 100.0);
        assert!(s.speed_x > 0.0);
    }

    #[test]
    fn rebounds_point_velocity_inwards() {
        let bounds = WorldBounds::new(100.0, 80.0);
        let mut start = moving(5.0, -3.0);
        start.pos_x = 101.0;
        start.pos_y = -1.0;
        let engine = BasicPhysicsEngine::new(start, Damping::none(), 0.5);

        engine.rebound_in_east(&bounds);
        engine.rebound_in_north(&bounds);
        let s = engine.current();
        assert_eq!(s.speed_x, -5.0);
        assert_eq!(s.speed_y, 3.0);
        assert!(bounds.contains(s.pos_x, s.pos_y));
    }

    #[test]
    fn setters_publish_new_state() {
        let engine = BasicPhysicsEngine::new(moving(0.0, 0.0), Damping::none(), 0.5);
        let (c0, _, _) = engine.buffer().slot_indices();
        engine.set_thrust(30.0);
        engine.angular_acceleration_inc(5.0);
        engine.angular_acceleration_inc(5.0);
        assert_ne!(engine.buffer().slot_indices().0, c0);
        assert!(engine.is_thrusting());
        assert_eq!(engine.current().angular_acc, 10.0);

        engine.set_acceleration(1.0, 1.0);
        engine.stop_pushing();
        let s = engine.current();
        assert_eq!((s.acc_x, s.acc_y, s.thrust), (0.0, 0.0, 0.0));
    }

    #[test]
    fn null_engine_ignores_everything() {
        let start = moving(5.0, 5.0);
        let engine = NullPhysicsEngine::new(start);
        engine.set_thrust(10.0);
        engine.rebound_in_west(&WorldBounds::new(10.0, 10.0));
        engine.set_physics_values(PhysicsState::default());
        assert_eq!(engine.calc_new_physics_values(5 * SEC), start);
        assert_eq!(engine.current(), start);
    }
}
