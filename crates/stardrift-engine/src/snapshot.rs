//! Read-only world snapshots for presentation and determinism checks.
//!
//! A [`WorldSnapshot`] is captured between ticks from each body's snapshot
//! slot, so it never observes a half-applied tick. Its BLAKE3 hash over the
//! canonical JSON bytes is the state fingerprint used by the determinism
//! tests: same seed + same inputs = same hash.

use serde::{Deserialize, Serialize};

use stardrift_core::body::{BodyId, BodyState, BodyType};
use stardrift_core::physics::{PhysicsState, WorldBounds};
use stardrift_core::world::World;

use crate::EngineError;

/// One body as a renderer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodySnapshot {
    pub id: BodyId,
    pub body_type: BodyType,
    pub state: BodyState,
    pub asset_id: String,
    pub physics: PhysicsState,
    pub age_secs: f64,
}

/// Player HUD data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: BodyId,
    pub weapons: usize,
    pub active_weapon: Option<usize>,
    /// Ammunition ratio per weapon slot.
    pub ammo_status: Vec<f64>,
    pub thrusting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub sim_time_ns: u64,
    pub bounds: WorldBounds,
    /// Live bodies in ascending slot order.
    pub bodies: Vec<BodySnapshot>,
    pub players: Vec<PlayerSnapshot>,
    pub alive: usize,
    pub created: u64,
    pub dead: u64,
}

impl WorldSnapshot {
    /// Capture every live body's snapshot slot.
    pub fn capture(world: &World, tick: u64, now_ns: u64) -> Self {
        let mut bodies = Vec::with_capacity(world.alive_count());
        let mut players = Vec::new();
        for body in world.bodies() {
            let physics = body.engine().buffer().snapshot();
            bodies.push(BodySnapshot {
                id: body.id(),
                body_type: body.body_type(),
                state: body.state(),
                asset_id: body.asset_id().to_owned(),
                physics,
                age_secs: body.age_secs(now_ns),
            });
            if body.body_type() == BodyType::Player {
                let weapons = body.weapons();
                players.push(PlayerSnapshot {
                    id: body.id(),
                    weapons: weapons.len(),
                    active_weapon: weapons.active_index(),
                    ammo_status: weapons.ammo_status(),
                    thrusting: physics.thrust != 0.0,
                });
            }
        }
        Self {
            tick,
            sim_time_ns: now_ns,
            bounds: world.bounds(),
            bodies,
            players,
            alive: world.alive_count(),
            created: world.created_count(),
            dead: world.dead_count(),
        }
    }

    /// An empty snapshot for a world that has not ticked yet.
    pub fn empty(bounds: WorldBounds) -> Self {
        Self {
            tick: 0,
            sim_time_ns: 0,
            bounds,
            bodies: Vec::new(),
            players: Vec::new(),
            alive: 0,
            created: 0,
            dead: 0,
        }
    }

    pub fn body(&self, id: BodyId) -> Option<&BodySnapshot> {
        self.bodies.iter().find(|b| b.id == id)
    }

    /// BLAKE3 hex digest (64 lowercase hex chars) of the canonical JSON form.
    pub fn hash(&self) -> Result<String, EngineError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }
}
