//! Actions decided by the rules and their deferred application.
//!
//! The rules read a tick's full event batch and queue [`Action`]s in an
//! [`ActionBuffer`]. Nothing is applied while the batch is being evaluated;
//! [`ActionBuffer::apply`] then runs every action in insertion order against
//! the [`World`]. Actions whose target has already died (possibly earlier in
//! the same batch) are skipped and counted, never applied to a recycled slot.
//!
//! # Example
//!
//! ```
//! use stardrift_core::prelude::*;
//! use rand::SeedableRng;
//!
//! let mut world = World::new(WorldBounds::new(100.0, 100.0), 8, 50.0, 16).unwrap();
//! let rock = world.add_body(BodySpec::dynamic("rock", 10.0, 10.0, 4.0), 0).unwrap();
//! let target = world.get(rock).unwrap().body_ref();
//!
//! let mut actions = ActionBuffer::new();
//! let event = DomainEvent::LifeOver { primary: target };
//! actions.push(target, ActionKind::Die, event.clone());
//! actions.push(target, ActionKind::Die, event);
//!
//! let mut rng = rand_pcg::Pcg64::seed_from_u64(0);
//! let report = actions.apply(&mut world, &mut ApplyContext { now_ns: 0, rng: &mut rng });
//! assert_eq!(report.applied, 1);
//! assert_eq!(report.skipped_stale, 1);
//! assert!(!world.contains(rock));
//! ```

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::body::{BodyId, BodyRef, BodyState};
use crate::event::{DomainEvent, LimitEdge};
use crate::world::World;
use crate::CoreError;

// ---------------------------------------------------------------------------
// ActionKind / Action
// ---------------------------------------------------------------------------

/// What the core should do to an action's target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    ReboundNorth,
    ReboundSouth,
    ReboundEast,
    ReboundWest,
    Die,
    /// Spawn the event's template as-is.
    SpawnBody,
    /// Spawn the event's template as a projectile shot by the target.
    SpawnProjectile,
    None,
}

impl ActionKind {
    /// The rebound that answers a crossing of `edge`.
    pub fn rebound_for(edge: LimitEdge) -> Self {
        match edge {
            LimitEdge::North => Self::ReboundNorth,
            LimitEdge::South => Self::ReboundSouth,
            LimitEdge::East => Self::ReboundEast,
            LimitEdge::West => Self::ReboundWest,
        }
    }
}

/// A decided reaction to one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub target: BodyRef,
    pub kind: ActionKind,
    /// The event this action answers.
    pub event: DomainEvent,
}

// ---------------------------------------------------------------------------
// ApplyReport / ApplyContext
// ---------------------------------------------------------------------------

/// Summary of one [`ActionBuffer::apply`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// Actions that changed the world.
    pub applied: usize,
    /// `None` actions.
    pub ignored: usize,
    /// Actions whose target was already dead.
    pub skipped_stale: usize,
    /// Spawns refused because the world was full.
    pub rejected_spawns: usize,
    /// Actions that could not be applied for any other reason (for example a
    /// spawn answering an event that carries no template).
    pub failed: usize,
    /// Bodies created by spawn actions, in application order.
    pub spawned: Vec<BodyId>,
    /// Bodies removed by `Die` actions, in application order.
    pub died: Vec<BodyId>,
}

/// Clock and randomness available while applying actions.
pub struct ApplyContext<'a> {
    pub now_ns: u64,
    pub rng: &'a mut dyn RngCore,
}

// ---------------------------------------------------------------------------
// ActionBuffer
// ---------------------------------------------------------------------------

/// FIFO queue of actions for one tick.
#[derive(Debug, Default)]
pub struct ActionBuffer {
    actions: Vec<Action>,
    last_report: ApplyReport,
}

impl ActionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: BodyRef, kind: ActionKind, event: DomainEvent) {
        self.actions.push(Action {
            target,
            kind,
            event,
        });
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Report from the last [`apply`](Self::apply) call.
    pub fn last_report(&self) -> &ApplyReport {
        &self.last_report
    }

    /// Apply and drain every queued action in insertion order.
    pub fn apply(&mut self, world: &mut World, ctx: &mut ApplyContext<'_>) -> &ApplyReport {
        let mut report = ApplyReport::default();

        for action in self.actions.drain(..) {
            let id = action.target.id;
            if action.kind == ActionKind::None {
                report.ignored += 1;
                continue;
            }
            if !world.contains(id) {
                debug!(body = %id, kind = ?action.kind, "action target already gone");
                report.skipped_stale += 1;
                continue;
            }

            let result = match action.kind {
                ActionKind::ReboundNorth => world.rebound(id, LimitEdge::North).map(|_| None),
                ActionKind::ReboundSouth => world.rebound(id, LimitEdge::South).map(|_| None),
                ActionKind::ReboundEast => world.rebound(id, LimitEdge::East).map(|_| None),
                ActionKind::ReboundWest => world.rebound(id, LimitEdge::West).map(|_| None),
                ActionKind::Die => {
                    world.remove_body(id);
                    report.died.push(id);
                    Ok(None)
                }
                ActionKind::SpawnBody | ActionKind::SpawnProjectile => {
                    Self::apply_spawn(world, &action, ctx).map(Some)
                }
                ActionKind::None => Ok(None),
            };

            match result {
                Ok(Some(spawned)) => {
                    report.applied += 1;
                    report.spawned.push(spawned);
                }
                Ok(None) => report.applied += 1,
                Err(CoreError::CapacityExhausted { max_bodies }) => {
                    debug!(body = %id, max_bodies, "spawn rejected: world full");
                    report.rejected_spawns += 1;
                }
                Err(err) => {
                    warn!(body = %id, kind = ?action.kind, error = %err, "action failed");
                    report.failed += 1;
                }
            }
        }

        self.last_report = report;
        &self.last_report
    }

    fn apply_spawn(
        world: &mut World,
        action: &Action,
        ctx: &mut ApplyContext<'_>,
    ) -> Result<BodyId, CoreError> {
        let DomainEvent::EmitRequested { spawn, .. } = &action.event else {
            return Err(CoreError::invalid(
                "action",
                format!("{:?} must answer an emission event", action.kind),
            ));
        };
        let id = action.target.id;
        let body = world.get(id)?;
        // Hold the emitter while the new body is built from its state.
        let was_collided = body.state() == BodyState::Collided;
        let held = body.transition(BodyState::Alive, BodyState::HandsOff)
            || body.transition(BodyState::Collided, BodyState::HandsOff);

        let spawned = world.spawn_from(
            id,
            spawn,
            action.kind == ActionKind::SpawnProjectile,
            &mut *ctx.rng,
            ctx.now_ns,
        );

        if held {
            let restore = if was_collided {
                BodyState::Collided
            } else {
                BodyState::Alive
            };
            if let Ok(body) = world.get(id) {
                body.transition(BodyState::HandsOff, restore);
            }
        }
        spawned
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
