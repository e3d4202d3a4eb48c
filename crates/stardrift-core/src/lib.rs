//! Stardrift core -- bodies, physics buffers, emitters and the spatial grid.
//!
//! This crate holds everything a single simulation tick touches: generational
//! body identities, the triple-buffered [`PhysicsState`](physics::PhysicsState)
//! published by each body's physics engine, the uniform [`SpatialGrid`]
//! broad phase, emitter and weapon cooldown state machines, the
//! [`DomainEvent`](event::DomainEvent) vocabulary and the
//! [`ActionBuffer`](action::ActionBuffer) that applies rule decisions back to
//! the [`World`](world::World).
//!
//! The tick driver itself lives in `stardrift-engine`.
//!
//! # Quick Start
//!
//! ```
//! use stardrift_core::prelude::*;
//!
//! let mut world = World::new(WorldBounds::new(1000.0, 800.0), 64, 128.0, 64).unwrap();
//! let id = world
//!     .add_body(BodySpec::dynamic("rock", 100.0, 100.0, 20.0).with_speed(10.0, 0.0), 0)
//!     .unwrap();
//!
//! assert!(world.contains(id));
//! assert_eq!(world.alive_count(), 1);
//! ```

#![deny(unsafe_code)]

pub mod action;
pub mod body;
pub mod emitter;
pub mod event;
pub mod physics;
pub mod pool;
pub mod spatial;
pub mod spawn;
pub mod weapon;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A configuration value failed validation.
    #[error("invalid {what}: {details}")]
    InvalidConfig {
        what: &'static str,
        details: String,
    },

    /// The body does not exist (dead, stale generation or never allocated).
    #[error("body {body:?} does not exist (dead, stale or never allocated)")]
    StaleBody {
        body: body::BodyId,
    },

    /// The world already holds `max_bodies` live bodies.
    #[error("body capacity exhausted ({max_bodies} live bodies)")]
    CapacityExhausted {
        max_bodies: usize,
    },

    /// The operation requires a different body type.
    #[error("body {body:?} is a {actual:?}, expected {expected}")]
    WrongBodyType {
        body: body::BodyId,
        actual: body::BodyType,
        expected: &'static str,
    },

    /// The body's lifecycle state does not allow the operation.
    #[error("cannot {operation} body {body:?} while it is {state:?}")]
    InvalidState {
        body: body::BodyId,
        state: body::BodyState,
        operation: &'static str,
    },

    /// A weapon or emitter slot index was out of range.
    #[error("body {body:?} has no {what} at slot {slot}")]
    UnknownSlot {
        body: body::BodyId,
        what: &'static str,
        slot: usize,
    },
}

impl CoreError {
    pub(crate) fn invalid(what: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            what,
            details: details.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::action::{Action, ActionBuffer, ActionKind, ApplyContext, ApplyReport};
    pub use crate::body::{Body, BodyId, BodyRef, BodySpec, BodyState, BodyType, Lifetime};
    pub use crate::emitter::{Emitter, EmitterConfig, EmitterStatus};
    pub use crate::event::{DomainEvent, EmissionKind, LimitEdge};
    pub use crate::physics::{
        BasicPhysicsEngine, Damping, NullPhysicsEngine, PhysicsBuffer, PhysicsEngine,
        PhysicsState, WorldBounds,
    };
    pub use crate::pool::{Pool, Poolable};
    pub use crate::spatial::{Aabb, SpatialGrid, SpatialGridStatistics};
    pub use crate::spawn::SpawnConfig;
    pub use crate::weapon::{EmitterTrigger, WeaponSet};
    pub use crate::world::World;
    pub use crate::CoreError;
}
