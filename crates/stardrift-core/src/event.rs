//! Domain events produced during a tick.
//!
//! Events are detected per body while the tick runs, gathered into one ordered
//! batch, handed to the rules and dropped before the next tick starts.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::body::BodyRef;
use crate::physics::{PhysicsState, WorldBounds};
use crate::spawn::SpawnConfig;

/// World edge crossed by a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitEdge {
    /// `y < 0`
    North,
    /// `y >= height`
    South,
    /// `x >= width`
    East,
    /// `x < 0`
    West,
}

/// Which emitter slot requested a spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmissionKind {
    Emitter,
    Trail,
    Weapon,
}

/// Something the rules may want to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// Two bodies overlap. `immunity` is set when a projectile touches its own
    /// shooter while still inside the immunity window.
    Collision {
        primary: BodyRef,
        secondary: BodyRef,
        immunity: bool,
    },
    LimitReached {
        primary: BodyRef,
        edge: LimitEdge,
    },
    LifeOver {
        primary: BodyRef,
    },
    EmitRequested {
        primary: BodyRef,
        kind: EmissionKind,
        spawn: Arc<SpawnConfig>,
    },
}

impl DomainEvent {
    /// The body the event is about.
    pub fn primary(&self) -> BodyRef {
        match self {
            Self::Collision { primary, .. }
            | Self::LimitReached { primary, .. }
            | Self::LifeOver { primary }
            | Self::EmitRequested { primary, .. } => *primary,
        }
    }

    /// The other party of a collision.
    pub fn secondary(&self) -> Option<BodyRef> {
        match self {
            Self::Collision { secondary, .. } => Some(*secondary),
            _ => None,
        }
    }
}

/// Push one `LimitReached` event per edge `state` lies beyond. A corner
/// yields two events, horizontal edge first.
pub fn detect_limits(
    primary: BodyRef,
    state: &PhysicsState,
    bounds: &WorldBounds,
    out: &mut Vec<DomainEvent>,
) {
    let horizontal = if state.pos_x < 0.0 {
        Some(LimitEdge::West)
    } else if state.pos_x >= bounds.width {
        Some(LimitEdge::East)
    } else {
        None
    };
    let vertical = if state.pos_y < 0.0 {
        Some(LimitEdge::North)
    } else if state.pos_y >= bounds.height {
        Some(LimitEdge::South)
    } else {
        None
    };
    for edge in [horizontal, vertical].into_iter().flatten() {
        out.push(DomainEvent::LimitReached { primary, edge });
    }
}
