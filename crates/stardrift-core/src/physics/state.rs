//! Kinematic state of a single body at one instant.

use serde::{Deserialize, Serialize};

/// Nanoseconds per simulated second.
pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Snapshot of one body's kinematics.
///
/// `angle` is in degrees, `[0, 360)`. `thrust` is a magnitude applied along
/// the heading on top of the direct acceleration. Everything is recomputed by
/// the physics engine each tick; a state is never mutated in place once it
/// has been published.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhysicsState {
    /// Simulation clock at which this state was computed.
    pub timestamp_ns: u64,
    pub pos_x: f64,
    pub pos_y: f64,
    pub angle: f64,
    /// Diameter of the body.
    pub size: f64,
    pub speed_x: f64,
    pub speed_y: f64,
    pub acc_x: f64,
    pub acc_y: f64,
    pub angular_speed: f64,
    pub angular_acc: f64,
    pub thrust: f64,
}

impl PhysicsState {
    /// A motionless state at `(x, y)`.
    pub fn at(x: f64, y: f64, size: f64) -> Self {
        Self {
            pos_x: x,
            pos_y: y,
            size,
            ..Default::default()
        }
    }

    /// Unit vector of the current heading.
    pub fn heading(&self) -> (f64, f64) {
        let rad = self.angle.to_radians();
        (rad.cos(), rad.sin())
    }

    /// Seconds elapsed between this state's timestamp and `now_ns`.
    ///
    /// Returns 0 when `now_ns` is older than the state.
    pub fn elapsed_secs(&self, now_ns: u64) -> f64 {
        now_ns.saturating_sub(self.timestamp_ns) as f64 / NANOS_PER_SEC
    }

    /// Half the diameter.
    pub fn radius(&self) -> f64 {
        self.size * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_follows_angle_in_degrees() {
        let mut s = PhysicsState::at(0.0, 0.0, 1.0);
        s.angle = 90.0;
        let (hx, hy) = s.heading();
        assert!(hx.abs() < 1e-12);
        assert!((hy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn elapsed_never_negative() {
        let s = PhysicsState {
            timestamp_ns: 2_000_000_000,
            ..Default::default()
        };
        assert_eq!(s.elapsed_secs(1_000_000_000), 0.0);
        assert!((s.elapsed_secs(2_500_000_000) - 0.5).abs() < 1e-12);
    }
}
