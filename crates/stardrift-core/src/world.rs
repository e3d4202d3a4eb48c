//! The body arena.
//!
//! [`World`] exclusively owns every live [`Body`], the [`SpatialGrid`] they
//! are indexed in, and the lifecycle counters. Slots are addressed by the
//! index half of a [`BodyId`]; a slot freed by a death is reused with a bumped
//! generation, so stale handles resolve to "not found".
//!
//! Structural changes (add, remove, equip) need `&mut World` and therefore
//! only happen between the parallel tick phases.

use std::sync::Arc;

use rand::Rng;
use tracing::debug;

use crate::body::{Body, BodyAllocator, BodyId, BodySpec, BodyState, BodyType};
use crate::emitter::{Emitter, EmitterConfig};
use crate::event::{DomainEvent, LimitEdge};
use crate::physics::{
    BasicPhysicsEngine, Damping, NullPhysicsEngine, PhysicsEngine, WorldBounds,
};
use crate::pool::Pool;
use crate::spatial::SpatialGrid;
use crate::spawn::SpawnConfig;
use crate::weapon::EmitterTrigger;
use crate::CoreError;

/// Default elapsed-time clamp for one integration step, in seconds.
pub const DEFAULT_MAX_DT: f64 = 0.5;

/// Arena of bodies plus the broad-phase index.
#[derive(Debug)]
pub struct World {
    bounds: WorldBounds,
    max_bodies: usize,
    max_dt: f64,
    vehicle_damping: Damping,
    projectile_damping: Damping,
    allocator: BodyAllocator,
    slots: Vec<Option<Body>>,
    grid: SpatialGrid,
    event_buffers: Pool<Vec<DomainEvent>>,
    alive: usize,
    created: u64,
    dead: u64,
}

impl World {
    /// Create an empty world.
    ///
    /// `max_bodies` caps the number of simultaneously live bodies. The grid
    /// parameters are validated by [`SpatialGrid::new`].
    pub fn new(
        bounds: WorldBounds,
        max_bodies: usize,
        cell_size: f64,
        max_cells_per_body: usize,
    ) -> Result<Self, CoreError> {
        if max_bodies == 0 {
            return Err(CoreError::invalid("world", "max bodies must be at least 1"));
        }
        Ok(Self {
            bounds,
            max_bodies,
            max_dt: DEFAULT_MAX_DT,
            vehicle_damping: Damping::none(),
            projectile_damping: Damping::none(),
            allocator: BodyAllocator::new(),
            slots: Vec::new(),
            grid: SpatialGrid::new(bounds, cell_size, max_cells_per_body)?,
            event_buffers: Pool::new(),
            alive: 0,
            created: 0,
            dead: 0,
        })
    }

    /// Default damping for moving bodies that do not override it.
    pub fn with_damping(mut self, vehicle: Damping, projectile: Damping) -> Self {
        self.vehicle_damping = vehicle;
        self.projectile_damping = projectile;
        self
    }

    pub fn with_max_dt(mut self, max_dt: f64) -> Self {
        self.max_dt = max_dt;
        self
    }

    // -- lifecycle ----------------------------------------------------------

    /// Register and activate a body born at `now_ns`.
    ///
    /// Indexed bodies are placed in the grid immediately so they can be
    /// found by queries issued before the next refresh.
    pub fn add_body(&mut self, spec: BodySpec, now_ns: u64) -> Result<BodyId, CoreError> {
        spec.validate()?;
        if !self.can_add_body() {
            return Err(CoreError::CapacityExhausted {
                max_bodies: self.max_bodies,
            });
        }
        if let Some(shooter) = spec.shooter {
            if !self.contains(shooter) {
                return Err(CoreError::StaleBody { body: shooter });
            }
        }

        let mut initial = spec.initial;
        initial.timestamp_ns = now_ns;
        let engine: Box<dyn PhysicsEngine> = if spec.body_type.is_moving() {
            let damping = spec.damping.unwrap_or(match spec.body_type {
                BodyType::Projectile => self.projectile_damping,
                _ => self.vehicle_damping,
            });
            Box::new(BasicPhysicsEngine::new(initial, damping, self.max_dt))
        } else {
            Box::new(NullPhysicsEngine::new(initial))
        };

        let id = self.allocator.allocate();
        let body = Body::new(id, &spec, engine, now_ns, self.event_buffers.acquire());
        body.activate();
        body.engine().buffer().refresh_snapshot();

        let idx = id.index() as usize;
        if idx >= self.slots.len() {
            self.slots.resize_with(idx + 1, || None);
        }
        if spec.body_type.is_indexed() {
            self.grid.upsert(id, body.aabb());
        }
        self.slots[idx] = Some(body);
        self.alive += 1;
        self.created += 1;
        debug!(body = %id, body_type = ?spec.body_type, asset = %spec.asset_id, "body added");
        Ok(id)
    }

    /// Kill and remove a body. Returns `false` if `id` was not live.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        if !self.allocator.is_alive(id) {
            return false;
        }
        let Some(body) = self.slots[id.index() as usize].take() else {
            return false;
        };
        body.die();
        self.grid.remove(id);
        self.allocator.deallocate(id);
        self.event_buffers.release(body.into_event_buffer());
        self.alive -= 1;
        self.dead += 1;
        debug!(body = %id, "body removed");
        true
    }

    /// Build a body from `spawn` relative to the current state of `emitter`.
    ///
    /// Projectiles get `emitter` as their shooter. `force_projectile` turns
    /// any template into a projectile.
    pub fn spawn_from<R: Rng + ?Sized>(
        &mut self,
        emitter: BodyId,
        spawn: &SpawnConfig,
        force_projectile: bool,
        rng: &mut R,
        now_ns: u64,
    ) -> Result<BodyId, CoreError> {
        let origin = self.get(emitter)?.physics();
        let mut spec = spawn.resolve(&origin, rng);
        if force_projectile {
            spec.body_type = BodyType::Projectile;
        }
        if spec.body_type == BodyType::Projectile {
            spec.shooter = Some(emitter);
        }
        self.add_body(spec, now_ns)
    }

    // -- equipment ----------------------------------------------------------

    /// Attach an emitter polled every tick. Returns its slot.
    pub fn equip_emitter(&mut self, id: BodyId, config: EmitterConfig) -> Result<usize, CoreError> {
        let emitter = Arc::new(Emitter::new(config)?);
        Ok(self.get_mut(id)?.push_emitter(emitter))
    }

    /// Attach a weapon to a player. Returns its slot.
    pub fn equip_weapon(&mut self, id: BodyId, config: EmitterConfig) -> Result<usize, CoreError> {
        let emitter = Arc::new(Emitter::new(config)?);
        let body = self.get_mut(id)?;
        if body.body_type() != BodyType::Player {
            return Err(CoreError::WrongBodyType {
                body: id,
                actual: body.body_type(),
                expected: "Player",
            });
        }
        Ok(body.weapons_mut().push(emitter))
    }

    /// Attach a trail emitter, requested automatically while thrusting.
    pub fn equip_trail(&mut self, id: BodyId, config: EmitterConfig) -> Result<(), CoreError> {
        let emitter = Arc::new(Emitter::new(config)?);
        self.get_mut(id)?.set_trail(emitter);
        Ok(())
    }

    /// Handle for requesting shots from weapon `slot` on another thread.
    pub fn weapon_trigger(&self, id: BodyId, slot: usize) -> Result<EmitterTrigger, CoreError> {
        let body = self.get(id)?;
        body.weapons()
            .get(slot)
            .map(|w| EmitterTrigger::new(Arc::clone(w)))
            .ok_or(CoreError::UnknownSlot {
                body: id,
                what: "weapon",
                slot,
            })
    }

    /// Handle for requesting emissions from emitter `slot` on another thread.
    pub fn emitter_trigger(&self, id: BodyId, slot: usize) -> Result<EmitterTrigger, CoreError> {
        let body = self.get(id)?;
        body.emitters()
            .get(slot)
            .map(|e| EmitterTrigger::new(Arc::clone(e)))
            .ok_or(CoreError::UnknownSlot {
                body: id,
                what: "emitter",
                slot,
            })
    }

    // -- mutations used by actions and controls -------------------------------

    pub fn rebound(&self, id: BodyId, edge: LimitEdge) -> Result<(), CoreError> {
        let body = self.get(id)?;
        let engine = body.engine();
        match edge {
            LimitEdge::North => engine.rebound_in_north(&self.bounds),
            LimitEdge::South => engine.rebound_in_south(&self.bounds),
            LimitEdge::East => engine.rebound_in_east(&self.bounds),
            LimitEdge::West => engine.rebound_in_west(&self.bounds),
        }
        Ok(())
    }

    /// Freeze a body: it keeps its place in the grid but is neither
    /// integrated nor scanned. Bodies marked by a collision this tick can be
    /// paused too. Returns `false` if the body is already paused or dying.
    pub fn pause_body(&self, id: BodyId) -> Result<bool, CoreError> {
        let body = self.get(id)?;
        Ok([BodyState::Alive, BodyState::Collided, BodyState::HandsOff]
            .into_iter()
            .any(|from| body.transition(from, BodyState::Paused)))
    }

    pub fn resume_body(&self, id: BodyId) -> Result<bool, CoreError> {
        Ok(self.get(id)?.transition(BodyState::Paused, BodyState::Alive))
    }

    /// Re-index every live indexed body at its current position.
    pub fn refresh_grid(&mut self) {
        for body in self.slots.iter().flatten() {
            if body.body_type().is_indexed() && !body.is_dead() {
                self.grid.upsert(body.id(), body.aabb());
            }
        }
    }

    /// Copy every body's current physics state into its snapshot slot.
    pub fn refresh_snapshots(&self) {
        for body in self.bodies() {
            body.engine().buffer().refresh_snapshot();
        }
    }

    // -- queries ------------------------------------------------------------

    pub fn contains(&self, id: BodyId) -> bool {
        self.allocator.is_alive(id)
    }

    pub fn get(&self, id: BodyId) -> Result<&Body, CoreError> {
        if !self.allocator.is_alive(id) {
            return Err(CoreError::StaleBody { body: id });
        }
        self.slots
            .get(id.index() as usize)
            .and_then(Option::as_ref)
            .ok_or(CoreError::StaleBody { body: id })
    }

    pub fn get_mut(&mut self, id: BodyId) -> Result<&mut Body, CoreError> {
        if !self.allocator.is_alive(id) {
            return Err(CoreError::StaleBody { body: id });
        }
        self.slots
            .get_mut(id.index() as usize)
            .and_then(Option::as_mut)
            .ok_or(CoreError::StaleBody { body: id })
    }

    /// Live bodies in ascending slot order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.slots.iter().flatten()
    }

    /// Raw slot array, for parallel iteration.
    pub fn slots(&self) -> &[Option<Body>] {
        &self.slots
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn bounds(&self) -> WorldBounds {
        self.bounds
    }

    pub fn max_bodies(&self) -> usize {
        self.max_bodies
    }

    pub fn can_add_body(&self) -> bool {
        self.alive < self.max_bodies
    }

    pub fn alive_count(&self) -> usize {
        self.alive
    }

    /// Bodies ever registered.
    pub fn created_count(&self) -> u64 {
        self.created
    }

    /// Bodies ever removed.
    pub fn dead_count(&self) -> u64 {
        self.dead
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Lifetime;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn world(max: usize) -> World {
        World::new(WorldBounds::new(1000.0, 1000.0), max, 100.0, 64).unwrap()
    }

    #[test]
    fn add_and_remove_keep_counters() {
        let mut w = world(10);
        let a = w.add_body(BodySpec::dynamic("a", 10.0, 10.0, 5.0), 0).unwrap();
        let b = w.add_body(BodySpec::dynamic("b", 20.0, 20.0, 5.0), 0).unwrap();
        assert_eq!(w.alive_count(), 2);
        assert_eq!(w.get(a).unwrap().state(), BodyState::Alive);

        assert!(w.remove_body(a));
        assert!(!w.remove_body(a));
        assert!(!w.contains(a));
        assert!(!w.grid().contains(a));
        assert!(w.get(a).is_err());
        assert_eq!(w.alive_count(), 1);
        assert_eq!(w.created_count(), 2);
        assert_eq!(w.dead_count(), 1);
        assert!(w.contains(b));
    }

    #[test]
    fn stale_ids_never_resolve_to_recycled_slots() {
        let mut w = world(10);
        let a = w.add_body(BodySpec::dynamic("a", 10.0, 10.0, 5.0), 0).unwrap();
        w.remove_body(a);
        let b = w.add_body(BodySpec::dynamic("b", 10.0, 10.0, 5.0), 0).unwrap();
        assert_eq!(a.index(), b.index());
        assert!(w.get(a).is_err());
        assert_eq!(w.get(b).unwrap().asset_id(), "b");
    }

    #[test]
    fn capacity_is_enforced() {
        let mut w = world(1);
        w.add_body(BodySpec::dynamic("a", 1.0, 1.0, 1.0), 0).unwrap();
        assert!(!w.can_add_body());
        let err = w.add_body(BodySpec::dynamic("b", 1.0, 1.0, 1.0), 0);
        assert!(matches!(err, Err(CoreError::CapacityExhausted { max_bodies: 1 })));
        assert_eq!(w.alive_count(), 1);
    }

    #[test]
    fn invalid_specs_are_rejected() {
        let mut w = world(4);
        let zero_life = BodySpec::dynamic("a", 1.0, 1.0, 1.0).with_max_life(Lifetime::Seconds(0.0));
        assert!(w.add_body(zero_life, 0).is_err());
        let orphan = BodySpec::projectile("p", 1.0, 1.0, 1.0, BodyId::new(3, 0));
        assert!(matches!(w.add_body(orphan, 0), Err(CoreError::StaleBody { .. })));
        assert_eq!(w.alive_count(), 0);
    }

    #[test]
    fn decorators_are_not_indexed() {
        let mut w = world(4);
        let d = w.add_body(BodySpec::decorator("smoke", 5.0, 5.0, 2.0), 0).unwrap();
        let s = w.add_body(BodySpec::static_body("sun", 5.0, 5.0, 2.0), 0).unwrap();
        assert!(!w.grid().contains(d));
        assert!(w.grid().contains(s));
    }

    #[test]
    fn weapons_only_for_players() {
        let mut w = world(4);
        let rock = w.add_body(BodySpec::dynamic("rock", 5.0, 5.0, 2.0), 0).unwrap();
        let ship = w.add_body(BodySpec::player("ship", 5.0, 5.0, 2.0), 0).unwrap();
        let gun = EmitterConfig::single_shot(5.0, SpawnConfig::projectile("b", 1.0, 100.0));
        assert!(matches!(
            w.equip_weapon(rock, gun.clone()),
            Err(CoreError::WrongBodyType { .. })
        ));
        assert_eq!(w.equip_weapon(ship, gun).unwrap(), 0);
        assert!(w.weapon_trigger(ship, 0).is_ok());
        assert!(matches!(
            w.weapon_trigger(ship, 1),
            Err(CoreError::UnknownSlot { .. })
        ));
    }

    #[test]
    fn spawned_projectiles_remember_their_shooter() {
        let mut w = world(4);
        let ship = w.add_body(BodySpec::player("ship", 50.0, 50.0, 10.0), 0).unwrap();
        let cfg = SpawnConfig::projectile("b", 1.0, 100.0).with_offsets(8.0, 0.0);
        let mut rng = Pcg64::seed_from_u64(3);
        let shot = w.spawn_from(ship, &cfg, true, &mut rng, 0).unwrap();
        let body = w.get(shot).unwrap();
        assert_eq!(body.body_type(), BodyType::Projectile);
        assert_eq!(body.shooter(), Some(ship));
        assert!((body.physics().pos_x - 58.0).abs() < 1e-9);
    }

    #[test]
    fn rebound_pulls_body_inside() {
        let mut w = world(4);
        let id = w
            .add_body(BodySpec::dynamic("a", -5.0, 10.0, 2.0).with_speed(-3.0, 0.0), 0)
            .unwrap();
        w.rebound(id, LimitEdge::West).unwrap();
        let s = w.get(id).unwrap().physics();
        assert!(s.pos_x > 0.0);
        assert_eq!(s.speed_x, 3.0);
    }

    #[test]
    fn pause_and_resume() {
        let mut w = world(4);
        let id = w.add_body(BodySpec::dynamic("a", 5.0, 5.0, 2.0), 0).unwrap();
        assert!(w.pause_body(id).unwrap());
        assert_eq!(w.get(id).unwrap().state(), BodyState::Paused);
        assert!(!w.pause_body(id).unwrap());
        assert!(w.resume_body(id).unwrap());
        assert_eq!(w.get(id).unwrap().state(), BodyState::Alive);
        assert!(!w.resume_body(id).unwrap());
    }

    #[test]
    fn collided_bodies_can_be_paused() {
        let mut w = world(4);
        let id = w.add_body(BodySpec::dynamic("a", 5.0, 5.0, 2.0), 0).unwrap();
        let body = w.get(id).unwrap();
        assert!(body.transition(BodyState::Alive, BodyState::Collided));
        assert!(w.pause_body(id).unwrap());
        assert_eq!(w.get(id).unwrap().state(), BodyState::Paused);
    }
}
