//! Pluggable game rules.
//!
//! An [`ActionsGenerator`] turns one tick's ordered event batch into actions.
//! It sees only the events, never the world, so it cannot mutate core state
//! behind the action applier's back.
//!
//! Three stock rule sets are provided:
//!
//! - [`LimitRebound`] -- bodies bounce off the world edges and nothing else
//!   reacts to collisions.
//! - [`ReboundCollisionPlayerImmunity`] -- edges bounce, colliding non-player
//!   bodies destroy each other.
//! - [`DeadInLimitsPlayerImmunity`] -- leaving the world is fatal except for
//!   players, collisions kill every non-player party.
//!
//! All three honour lifetimes (`LifeOver` -> `Die`) and emissions (weapon
//! emissions spawn projectiles, the rest spawn bodies).

use stardrift_core::action::{ActionBuffer, ActionKind};
use stardrift_core::body::{BodyRef, BodyType};
use stardrift_core::event::{DomainEvent, EmissionKind};

/// Maps an event batch to actions.
pub trait ActionsGenerator: Send {
    /// Append the actions answering `events` to `actions`. Events arrive in
    /// the tick's deterministic order.
    fn provide_actions(&mut self, events: &[DomainEvent], actions: &mut ActionBuffer);
}

impl<F> ActionsGenerator for F
where
    F: FnMut(&[DomainEvent], &mut ActionBuffer) + Send,
{
    fn provide_actions(&mut self, events: &[DomainEvent], actions: &mut ActionBuffer) {
        self(events, actions)
    }
}

/// Shared answers for lifetime and emission events. Returns `true` if the
/// event was handled.
fn lifecycle_rules(event: &DomainEvent, actions: &mut ActionBuffer) -> bool {
    match event {
        DomainEvent::LifeOver { primary } => {
            actions.push(*primary, ActionKind::Die, event.clone());
            true
        }
        DomainEvent::EmitRequested { primary, kind, .. } => {
            let action = match kind {
                EmissionKind::Weapon => ActionKind::SpawnProjectile,
                EmissionKind::Emitter | EmissionKind::Trail => ActionKind::SpawnBody,
            };
            actions.push(*primary, action, event.clone());
            true
        }
        _ => false,
    }
}

fn is_player(body: &BodyRef) -> bool {
    body.body_type == BodyType::Player
}

// ---------------------------------------------------------------------------
// LimitRebound
// ---------------------------------------------------------------------------

/// Bounce off every edge; ignore collisions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitRebound;

impl ActionsGenerator for LimitRebound {
    fn provide_actions(&mut self, events: &[DomainEvent], actions: &mut ActionBuffer) {
        for event in events {
            if lifecycle_rules(event, actions) {
                continue;
            }
            if let DomainEvent::LimitReached { primary, edge } = event {
                actions.push(*primary, ActionKind::rebound_for(*edge), event.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ReboundCollisionPlayerImmunity
// ---------------------------------------------------------------------------

/// Bounce off edges. Collisions kill both parties unless a player is
/// involved, a decorator is involved, or the projectile is immune to its
/// shooter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReboundCollisionPlayerImmunity;

impl ActionsGenerator for ReboundCollisionPlayerImmunity {
    fn provide_actions(&mut self, events: &[DomainEvent], actions: &mut ActionBuffer) {
        for event in events {
            if lifecycle_rules(event, actions) {
                continue;
            }
            match event {
                DomainEvent::LimitReached { primary, edge } => {
                    actions.push(*primary, ActionKind::rebound_for(*edge), event.clone());
                }
                DomainEvent::Collision {
                    primary,
                    secondary,
                    immunity,
                } => {
                    if is_player(primary) || is_player(secondary) || *immunity {
                        continue;
                    }
                    if primary.body_type == BodyType::Decorator
                        || secondary.body_type == BodyType::Decorator
                    {
                        continue;
                    }
                    actions.push(*primary, ActionKind::Die, event.clone());
                    actions.push(*secondary, ActionKind::Die, event.clone());
                }
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DeadInLimitsPlayerImmunity
// ---------------------------------------------------------------------------

/// Leaving the world kills everything but players. In a collision every
/// non-player party dies unless the projectile is immune to its shooter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadInLimitsPlayerImmunity;

impl ActionsGenerator for DeadInLimitsPlayerImmunity {
    fn provide_actions(&mut self, events: &[DomainEvent], actions: &mut ActionBuffer) {
        for event in events {
            if lifecycle_rules(event, actions) {
                continue;
            }
            match event {
                DomainEvent::LimitReached { primary, .. } => {
                    let kind = if is_player(primary) {
                        ActionKind::None
                    } else {
                        ActionKind::Die
                    };
                    actions.push(*primary, kind, event.clone());
                }
                DomainEvent::Collision {
                    primary,
                    secondary,
                    immunity,
                } => {
                    if *immunity {
                        continue;
                    }
                    for party in [primary, secondary] {
                        let kind = if is_player(party) {
                            ActionKind::None
                        } else {
                            ActionKind::Die
                        };
                        actions.push(*party, kind, event.clone());
                    }
                }
                _ => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
