//! Physics state, its triple buffer, and the engines that integrate it.

mod buffer;
mod engine;
mod state;

pub use buffer::PhysicsBuffer;
pub use engine::{BasicPhysicsEngine, Damping, NullPhysicsEngine, PhysicsEngine, REBOUND_EPSILON};
pub use state::{PhysicsState, NANOS_PER_SEC};

use serde::{Deserialize, Serialize};

/// Rectangular world extent. The origin is the top-left corner, `y` grows
/// downwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldBounds {
    pub width: f64,
    pub height: f64,
}

impl WorldBounds {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Whether `(x, y)` lies inside `[0, width) x [0, height)`.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && x < self.width && y >= 0.0 && y < self.height
    }
}
