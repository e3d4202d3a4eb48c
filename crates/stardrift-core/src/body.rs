//! Body identifiers, lifecycle and the [`Body`] record itself.
//!
//! A [`BodyId`] is a 64-bit handle packing a *generation* counter in the high
//! 32 bits and a slot *index* in the low 32 bits. The generation is bumped
//! whenever a slot is freed, so a handle to a dead body never resolves to the
//! body that later reuses its slot.

use std::cmp::Ordering as CmpOrdering;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::emitter::Emitter;
use crate::event::DomainEvent;
use crate::physics::{Damping, PhysicsEngine, PhysicsState, NANOS_PER_SEC};
use crate::spatial::Aabb;
use crate::weapon::WeaponSet;
use crate::CoreError;

// ---------------------------------------------------------------------------
// BodyId
// ---------------------------------------------------------------------------

/// A generational body identifier.
///
/// Layout: `[generation: u32 | index: u32]`. Ordering is by index first so
/// that sorting ids reproduces arena order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyId(u64);

impl BodyId {
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Ord for BodyId {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        (self.index(), self.generation()).cmp(&(other.index(), other.generation()))
    }
}

impl PartialOrd for BodyId {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyId({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// BodyAllocator
// ---------------------------------------------------------------------------

/// Hands out [`BodyId`]s, recycling slot indices with a bumped generation.
///
/// Free indices are reused in FIFO order.
#[derive(Debug, Default)]
pub struct BodyAllocator {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free_indices: VecDeque<u32>,
}

impl BodyAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> BodyId {
        if let Some(index) = self.free_indices.pop_front() {
            self.alive[index as usize] = true;
            BodyId::new(index, self.generations[index as usize])
        } else {
            let index = self.generations.len() as u32;
            self.generations.push(0);
            self.alive.push(true);
            BodyId::new(index, 0)
        }
    }

    /// Free `id`. Returns `false` if it was already free or stale.
    pub fn deallocate(&mut self, id: BodyId) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let idx = id.index() as usize;
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_indices.push_back(id.index());
        true
    }

    pub fn is_alive(&self, id: BodyId) -> bool {
        let idx = id.index() as usize;
        idx < self.generations.len() && self.alive[idx] && self.generations[idx] == id.generation()
    }
}

// ---------------------------------------------------------------------------
// BodyType / BodyRef / BodyState
// ---------------------------------------------------------------------------

/// What kind of participant a body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BodyType {
    Dynamic,
    Player,
    Projectile,
    /// Immovable gravity body.
    Static,
    /// Purely visual; never indexed, never collides, never hits limits.
    Decorator,
}

impl BodyType {
    /// Integrated by a [`BasicPhysicsEngine`](crate::physics::BasicPhysicsEngine).
    pub fn is_moving(self) -> bool {
        matches!(self, Self::Dynamic | Self::Player | Self::Projectile)
    }

    /// Registered in the spatial grid.
    pub fn is_indexed(self) -> bool {
        self != Self::Decorator
    }

    /// Scans its grid neighbours for collisions and checks world limits.
    pub fn scans_surroundings(self) -> bool {
        self.is_moving()
    }
}

/// Lightweight reference carried by events and actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyRef {
    pub id: BodyId,
    pub body_type: BodyType,
}

/// Lifecycle state. `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BodyState {
    Starting = 0,
    Alive = 1,
    Paused = 2,
    /// Named by a collision event this tick.
    Collided = 3,
    /// Being mutated by the action applier.
    HandsOff = 4,
    Dead = 5,
}

impl BodyState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Alive,
            2 => Self::Paused,
            3 => Self::Collided,
            4 => Self::HandsOff,
            _ => Self::Dead,
        }
    }
}

// ---------------------------------------------------------------------------
// Lifetime
// ---------------------------------------------------------------------------

/// Maximum lifetime of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub enum Lifetime {
    #[default]
    Unlimited,
    Seconds(f64),
}

impl Lifetime {
    /// Interpret the conventional raw encoding where `-1` means unlimited.
    pub fn from_raw(secs: f64) -> Result<Self, CoreError> {
        let life = if secs == -1.0 {
            Self::Unlimited
        } else {
            Self::Seconds(secs)
        };
        life.validate()?;
        Ok(life)
    }

    /// A finite lifetime must be positive; zero is a configuration error.
    pub fn validate(&self) -> Result<(), CoreError> {
        match *self {
            Self::Unlimited => Ok(()),
            Self::Seconds(s) if s.is_finite() && s > 0.0 => Ok(()),
            Self::Seconds(s) => Err(CoreError::invalid(
                "lifetime",
                format!("must be -1 (unlimited) or a positive number of seconds, got {s}"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// BodySpec
// ---------------------------------------------------------------------------

/// Everything needed to register a body with the [`World`](crate::world::World).
#[derive(Debug, Clone, PartialEq)]
pub struct BodySpec {
    pub body_type: BodyType,
    pub asset_id: String,
    pub initial: PhysicsState,
    pub max_life: Lifetime,
    /// Descriptive only; the integrator treats thrust as an acceleration.
    pub mass: f64,
    /// Overrides the world's default damping for this body type.
    pub damping: Option<Damping>,
    /// Required for projectiles.
    pub shooter: Option<BodyId>,
}

impl BodySpec {
    pub fn new(body_type: BodyType, asset_id: &str, x: f64, y: f64, size: f64) -> Self {
        Self {
            body_type,
            asset_id: asset_id.to_owned(),
            initial: PhysicsState::at(x, y, size),
            max_life: Lifetime::Unlimited,
            mass: 0.0,
            damping: None,
            shooter: None,
        }
    }

    pub fn dynamic(asset_id: &str, x: f64, y: f64, size: f64) -> Self {
        Self::new(BodyType::Dynamic, asset_id, x, y, size)
    }

    pub fn player(asset_id: &str, x: f64, y: f64, size: f64) -> Self {
        Self::new(BodyType::Player, asset_id, x, y, size)
    }

    pub fn projectile(asset_id: &str, x: f64, y: f64, size: f64, shooter: BodyId) -> Self {
        Self::new(BodyType::Projectile, asset_id, x, y, size).with_shooter(shooter)
    }

    pub fn static_body(asset_id: &str, x: f64, y: f64, size: f64) -> Self {
        Self::new(BodyType::Static, asset_id, x, y, size)
    }

    pub fn decorator(asset_id: &str, x: f64, y: f64, size: f64) -> Self {
        Self::new(BodyType::Decorator, asset_id, x, y, size)
    }

    pub fn with_speed(mut self, speed_x: f64, speed_y: f64) -> Self {
        self.initial.speed_x = speed_x;
        self.initial.speed_y = speed_y;
        self
    }

    pub fn with_acceleration(mut self, acc_x: f64, acc_y: f64) -> Self {
        self.initial.acc_x = acc_x;
        self.initial.acc_y = acc_y;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.initial.angle = angle.rem_euclid(360.0);
        self
    }

    pub fn with_angular_speed(mut self, angular_speed: f64) -> Self {
        self.initial.angular_speed = angular_speed;
        self
    }

    pub fn with_thrust(mut self, thrust: f64) -> Self {
        self.initial.thrust = thrust;
        self
    }

    pub fn with_max_life(mut self, max_life: Lifetime) -> Self {
        self.max_life = max_life;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_damping(mut self, damping: Damping) -> Self {
        self.damping = Some(damping);
        self
    }

    pub fn with_shooter(mut self, shooter: BodyId) -> Self {
        self.shooter = Some(shooter);
        self
    }

    /// Reject specs the world must not register.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.asset_id.is_empty() {
            return Err(CoreError::invalid("body", "asset id is required"));
        }
        let s = &self.initial;
        if !(s.size.is_finite() && s.size > 0.0) {
            return Err(CoreError::invalid(
                "body",
                format!("size must be positive and finite, got {}", s.size),
            ));
        }
        if !(s.pos_x.is_finite() && s.pos_y.is_finite()) {
            return Err(CoreError::invalid("body", "position must be finite"));
        }
        if !(self.mass.is_finite() && self.mass >= 0.0) {
            return Err(CoreError::invalid(
                "body",
                format!("mass must be finite and non-negative, got {}", self.mass),
            ));
        }
        if self.body_type == BodyType::Projectile && self.shooter.is_none() {
            return Err(CoreError::invalid("body", "projectiles need a shooter"));
        }
        self.max_life.validate()
    }
}

// ---------------------------------------------------------------------------
// Body
// ---------------------------------------------------------------------------

/// A registered simulation participant.
///
/// Bodies are owned by the [`World`](crate::world::World) arena. During the
/// parallel tick phases they are reached through shared references; all state
/// touched there (lifecycle, physics buffer, emitter counters, the event
/// scratch list) uses interior mutability.
pub struct Body {
    id: BodyId,
    body_type: BodyType,
    state: AtomicU8,
    born_at_ns: u64,
    max_life: Lifetime,
    asset_id: String,
    mass: f64,
    shooter: Option<BodyId>,
    engine: Box<dyn PhysicsEngine>,
    emitters: Vec<Arc<Emitter>>,
    weapons: WeaponSet,
    trail: Option<Arc<Emitter>>,
    events: Mutex<Vec<DomainEvent>>,
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("id", &self.id)
            .field("body_type", &self.body_type)
            .field("state", &self.state())
            .field("asset_id", &self.asset_id)
            .finish_non_exhaustive()
    }
}

impl Body {
    pub(crate) fn new(
        id: BodyId,
        spec: &BodySpec,
        engine: Box<dyn PhysicsEngine>,
        born_at_ns: u64,
        events: Vec<DomainEvent>,
    ) -> Self {
        Self {
            id,
            body_type: spec.body_type,
            state: AtomicU8::new(BodyState::Starting as u8),
            born_at_ns,
            max_life: spec.max_life,
            asset_id: spec.asset_id.clone(),
            mass: spec.mass,
            shooter: spec.shooter,
            engine,
            emitters: Vec::new(),
            weapons: WeaponSet::default(),
            trail: None,
            events: Mutex::new(events),
        }
    }

    // -- lifecycle ----------------------------------------------------------

    /// Move from `Starting` to `Alive`.
    ///
    /// # Panics
    ///
    /// Panics if the body was already activated.
    pub fn activate(&self) {
        let swapped = self.state.compare_exchange(
            BodyState::Starting as u8,
            BodyState::Alive as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Err(actual) = swapped {
            panic!(
                "body {} activated twice (state {:?})",
                self.id,
                BodyState::from_u8(actual)
            );
        }
    }

    /// Mark the body dead. Returns `true` if this call killed it.
    pub fn die(&self) -> bool {
        self.state.swap(BodyState::Dead as u8, Ordering::AcqRel) != BodyState::Dead as u8
    }

    pub fn state(&self) -> BodyState {
        BodyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_dead(&self) -> bool {
        self.state() == BodyState::Dead
    }

    /// Atomically move `from` -> `to`. Fails if the body is in another state.
    pub fn transition(&self, from: BodyState, to: BodyState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether a finite lifetime has elapsed at `now_ns`.
    pub fn is_life_over(&self, now_ns: u64) -> bool {
        match self.max_life {
            Lifetime::Unlimited => false,
            Lifetime::Seconds(limit) => self.age_secs(now_ns) >= limit,
        }
    }

    pub fn age_secs(&self, now_ns: u64) -> f64 {
        now_ns.saturating_sub(self.born_at_ns) as f64 / NANOS_PER_SEC
    }

    // -- accessors ----------------------------------------------------------

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    pub fn body_ref(&self) -> BodyRef {
        BodyRef {
            id: self.id,
            body_type: self.body_type,
        }
    }

    pub fn born_at_ns(&self) -> u64 {
        self.born_at_ns
    }

    pub fn max_life(&self) -> Lifetime {
        self.max_life
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn shooter(&self) -> Option<BodyId> {
        self.shooter
    }

    pub fn engine(&self) -> &dyn PhysicsEngine {
        self.engine.as_ref()
    }

    /// The current physics state.
    pub fn physics(&self) -> PhysicsState {
        self.engine.current()
    }

    pub fn aabb(&self) -> Aabb {
        let s = self.physics();
        Aabb::around(s.pos_x, s.pos_y, s.size)
    }

    pub fn emitters(&self) -> &[Arc<Emitter>] {
        &self.emitters
    }

    pub fn weapons(&self) -> &WeaponSet {
        &self.weapons
    }

    pub fn weapons_mut(&mut self) -> &mut WeaponSet {
        &mut self.weapons
    }

    pub fn trail(&self) -> Option<&Arc<Emitter>> {
        self.trail.as_ref()
    }

    /// Per-body event scratch list, filled during the parallel phases.
    pub fn events(&self) -> MutexGuard<'_, Vec<DomainEvent>> {
        self.events.lock()
    }

    pub(crate) fn push_emitter(&mut self, emitter: Arc<Emitter>) -> usize {
        self.emitters.push(emitter);
        self.emitters.len() - 1
    }

    pub(crate) fn set_trail(&mut self, trail: Arc<Emitter>) {
        self.trail = Some(trail);
    }

    pub(crate) fn into_event_buffer(self) -> Vec<DomainEvent> {
        self.events.into_inner()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
