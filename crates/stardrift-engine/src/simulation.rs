//! The fixed-timestep tick driver.
//!
//! Each [`Simulation::tick`] runs these phases in order:
//!
//! 1. **integrate** (parallel) -- every live body clears its event list,
//!    reports `LifeOver` if its lifetime has elapsed, otherwise integrates its
//!    physics to the new tick time and reports the world edges it crossed.
//! 2. **grid** -- every indexed body is re-inserted in the spatial grid at its
//!    new position.
//! 3. **scan** (parallel) -- scanning bodies query their neighbours and report
//!    overlaps; every body polls its trail, emitters and weapons.
//! 4. **rules** -- the per-body event lists are gathered in slot order and
//!    handed to the [`ActionsGenerator`].
//! 5. **apply** -- the actions are applied in order and every body's snapshot
//!    slot is refreshed.
//!
//! Simulation time is `tick_count * fixed_dt`, never wall-clock time, and all
//! randomness comes from one seeded RNG used only in the sequential apply
//! phase. Per-body work in the parallel phases only writes to the body that
//! owns it (plus commutative state flags), so the parallel and sequential
//! modes produce identical results.

use std::time::{Duration, Instant};

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64;
use rayon::prelude::*;
use tracing::{debug, debug_span, info, trace};

use stardrift_core::action::{ActionBuffer, ApplyContext, ApplyReport};
use stardrift_core::body::{Body, BodyId, BodySpec, BodyState, BodyType};
use stardrift_core::emitter::{Emitter, EmitterConfig};
use stardrift_core::event::{detect_limits, DomainEvent, EmissionKind};
use stardrift_core::physics::WorldBounds;
use stardrift_core::spatial::SpatialGridStatistics;
use stardrift_core::world::World;
use stardrift_core::CoreError;

use crate::config::SimulationConfig;
use crate::control::{ControlCommand, PlayerControl};
use crate::profiler::{Profiler, ProfilingStatistics};
use crate::rules::ActionsGenerator;
use crate::snapshot::WorldSnapshot;
use crate::world_def::{BodyDef, WorldDefinitionProvider};
use crate::EngineError;

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// What happened during the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub tick: u64,
    /// The tick was skipped because the simulation is paused.
    pub paused: bool,
    pub events: usize,
    pub actions: usize,
    pub apply: ApplyReport,
    /// Wall-clock time per phase, in execution order.
    pub phase_times: Vec<(&'static str, Duration)>,
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// Per-body phase work
// ---------------------------------------------------------------------------

/// Read-only parameters shared by the parallel phases.
#[derive(Debug, Clone, Copy)]
struct TickContext {
    now_ns: u64,
    dt: f64,
    bounds: WorldBounds,
    collision_radius_factor: f64,
    immunity_secs: f64,
}

fn integrate_body(body: &Body, ctx: &TickContext) {
    body.events().clear();
    match body.state() {
        BodyState::Dead | BodyState::Starting => return,
        BodyState::Paused => {
            body.engine().sync_timestamp(ctx.now_ns);
            return;
        }
        BodyState::Collided => {
            body.transition(BodyState::Collided, BodyState::Alive);
        }
        BodyState::Alive | BodyState::HandsOff => {}
    }

    if body.is_life_over(ctx.now_ns) {
        body.events().push(DomainEvent::LifeOver {
            primary: body.body_ref(),
        });
        return;
    }

    if body.body_type().is_moving() {
        let engine = body.engine();
        let state = engine.calc_new_physics_values(ctx.now_ns);
        engine.set_physics_values(state);
        if body.body_type().scans_surroundings() {
            detect_limits(body.body_ref(), &state, &ctx.bounds, &mut body.events());
        }
    } else {
        body.engine().sync_timestamp(ctx.now_ns);
    }
}

/// Whether `body` takes part in the scan phase this tick.
fn is_scanning(body: &Body, now_ns: u64) -> bool {
    matches!(body.state(), BodyState::Alive | BodyState::Collided) && !body.is_life_over(now_ns)
}

/// `projectile` was fired by `other` recently enough to pass through it.
fn is_immune(projectile: &Body, other: &Body, ctx: &TickContext) -> bool {
    projectile.body_type() == BodyType::Projectile
        && projectile.shooter() == Some(other.id())
        && projectile.age_secs(ctx.now_ns) < ctx.immunity_secs
}

fn overlaps(a: &Body, b: &Body, factor: f64) -> bool {
    let sa = a.physics();
    let sb = b.physics();
    let dx = sa.pos_x - sb.pos_x;
    let dy = sa.pos_y - sb.pos_y;
    let reach = (sa.size + sb.size) * 0.5 * factor;
    dx * dx + dy * dy < reach * reach
}

fn scan_body(body: &Body, world: &World, ctx: &TickContext, neighbors: &mut Vec<BodyId>) {
    if !is_scanning(body, ctx.now_ns) {
        return;
    }
    let mut found = Vec::new();

    if body.body_type().scans_surroundings() {
        world.grid().query_neighbors(body.id(), neighbors);
        for &other_id in neighbors.iter() {
            let Ok(other) = world.get(other_id) else {
                continue;
            };
            if other.is_dead() || other.body_type() == BodyType::Decorator {
                continue;
            }
            // Pairs of scanning bodies are reported once, by the lower id.
            if other.body_type().scans_surroundings()
                && is_scanning(other, ctx.now_ns)
                && other_id < body.id()
            {
                continue;
            }
            if !overlaps(body, other, ctx.collision_radius_factor) {
                continue;
            }
            let immunity = is_immune(body, other, ctx) || is_immune(other, body, ctx);
            trace!(primary = %body.id(), secondary = %other_id, immunity, "collision");
            found.push(DomainEvent::Collision {
                primary: body.body_ref(),
                secondary: other.body_ref(),
                immunity,
            });
            body.transition(BodyState::Alive, BodyState::Collided);
            other.transition(BodyState::Alive, BodyState::Collided);
        }
    }

    let mut poll = |emitter: &Emitter, kind: EmissionKind| {
        if emitter.must_emit_now(ctx.dt) {
            found.push(DomainEvent::EmitRequested {
                primary: body.body_ref(),
                kind,
                spawn: emitter.spawn().clone(),
            });
        }
    };
    if let Some(trail) = body.trail() {
        if body.engine().is_thrusting() {
            trail.register_request();
        }
        poll(trail, EmissionKind::Trail);
    }
    for emitter in body.emitters() {
        poll(emitter, EmissionKind::Emitter);
    }
    for weapon in body.weapons().iter() {
        poll(weapon, EmissionKind::Weapon);
    }

    if !found.is_empty() {
        body.events().append(&mut found);
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// A deterministic simulation: world, clock, RNG and rules.
pub struct Simulation {
    config: SimulationConfig,
    fixed_dt_ns: u64,
    world: World,
    rules: Box<dyn ActionsGenerator>,
    actions: ActionBuffer,
    batch: Vec<DomainEvent>,
    rng: Pcg64,
    tick_counter: u64,
    paused: bool,
    profiler: Profiler,
    last_diagnostics: TickDiagnostics,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("tick_counter", &self.tick_counter)
            .field("paused", &self.paused)
            .field("alive", &self.world.alive_count())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    pub fn new(
        config: SimulationConfig,
        rules: impl ActionsGenerator + 'static,
    ) -> Result<Self, EngineError> {
        let world = config.build_world()?;
        info!(
            width = config.world_width,
            height = config.world_height,
            max_bodies = config.max_bodies,
            seed = config.rng_seed,
            "simulation created"
        );
        Ok(Self {
            fixed_dt_ns: config.fixed_dt_ns(),
            rng: Pcg64::seed_from_u64(config.rng_seed),
            config,
            world,
            rules: Box::new(rules),
            actions: ActionBuffer::new(),
            batch: Vec::new(),
            tick_counter: 0,
            paused: false,
            profiler: Profiler::new(),
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    // -- population ---------------------------------------------------------

    /// Register a body born at the current simulation time.
    pub fn add_body(&mut self, spec: BodySpec) -> Result<BodyId, EngineError> {
        Ok(self.world.add_body(spec, self.now_ns())?)
    }

    pub fn remove_body(&mut self, id: BodyId) -> bool {
        self.world.remove_body(id)
    }

    pub fn equip_emitter(&mut self, id: BodyId, config: EmitterConfig) -> Result<usize, EngineError> {
        Ok(self.world.equip_emitter(id, config)?)
    }

    pub fn equip_weapon(&mut self, id: BodyId, config: EmitterConfig) -> Result<usize, EngineError> {
        Ok(self.world.equip_weapon(id, config)?)
    }

    pub fn equip_trail(&mut self, id: BodyId, config: EmitterConfig) -> Result<(), EngineError> {
        Ok(self.world.equip_trail(id, config)?)
    }

    /// Add every body of a world definition with its equipment. Returns the
    /// new ids in definition order.
    ///
    /// The whole definition is checked before anything is added: a rejected
    /// definition leaves the world untouched.
    pub fn load_world(
        &mut self,
        provider: &dyn WorldDefinitionProvider,
    ) -> Result<Vec<BodyId>, EngineError> {
        let definition = provider.provide()?;
        let specs = definition
            .bodies
            .iter()
            .map(|def| {
                let spec = def.to_spec()?;
                spec.validate()?;
                def.validate_equipment()?;
                Ok(spec)
            })
            .collect::<Result<Vec<_>, EngineError>>()?;
        let free = self.world.max_bodies() - self.world.alive_count();
        if specs.len() > free {
            return Err(CoreError::CapacityExhausted {
                max_bodies: self.world.max_bodies(),
            }
            .into());
        }

        let mut ids = Vec::with_capacity(specs.len());
        for (def, spec) in definition.bodies.iter().zip(specs) {
            if let Err(err) = self.add_equipped(def, spec, &mut ids) {
                for &id in &ids {
                    self.world.remove_body(id);
                }
                return Err(err);
            }
        }
        info!(bodies = ids.len(), "world definition loaded");
        Ok(ids)
    }

    fn add_equipped(
        &mut self,
        def: &BodyDef,
        spec: BodySpec,
        ids: &mut Vec<BodyId>,
    ) -> Result<(), EngineError> {
        let id = self.add_body(spec)?;
        ids.push(id);
        for emitter in &def.emitters {
            self.equip_emitter(id, emitter.clone())?;
        }
        for weapon in &def.weapons {
            self.equip_weapon(id, weapon.clone())?;
        }
        if let Some(trail) = &def.trail {
            self.equip_trail(id, trail.clone())?;
        }
        Ok(())
    }

    // -- control ------------------------------------------------------------

    /// Apply an external request between ticks.
    pub fn control(&mut self, command: ControlCommand) -> Result<(), EngineError> {
        match command {
            ControlCommand::Player { body, control } => self.player_control(body, control),
            ControlCommand::PauseBody(id) => {
                if self.world.pause_body(id)? {
                    debug!(body = %id, "body paused");
                    Ok(())
                } else {
                    Err(self.invalid_state(id, "pause"))
                }
            }
            ControlCommand::ResumeBody(id) => {
                if self.world.resume_body(id)? {
                    debug!(body = %id, "body resumed");
                    Ok(())
                } else {
                    Err(self.invalid_state(id, "resume"))
                }
            }
            ControlCommand::Pause => {
                self.pause();
                Ok(())
            }
            ControlCommand::Resume => {
                self.resume();
                Ok(())
            }
        }
    }

    fn invalid_state(&self, id: BodyId, operation: &'static str) -> EngineError {
        match self.world.get(id) {
            Ok(body) => CoreError::InvalidState {
                body: id,
                state: body.state(),
                operation,
            }
            .into(),
            Err(err) => err.into(),
        }
    }

    fn player_control(&mut self, id: BodyId, control: PlayerControl) -> Result<(), EngineError> {
        let tuning = self.config.player;
        let body = self.world.get_mut(id)?;
        if body.body_type() != BodyType::Player {
            return Err(CoreError::WrongBodyType {
                body: id,
                actual: body.body_type(),
                expected: "Player",
            }
            .into());
        }
        let engine = body.engine();
        match control {
            PlayerControl::ThrustOn => engine.set_thrust(tuning.max_thrust),
            PlayerControl::ThrustReverse => engine.set_thrust(-tuning.max_thrust),
            PlayerControl::ThrustOff => engine.set_thrust(0.0),
            PlayerControl::RotateLeft => engine.set_angular_speed(-tuning.angular_speed),
            PlayerControl::RotateRight => engine.set_angular_speed(tuning.angular_speed),
            PlayerControl::RotateOff => engine.set_angular_speed(0.0),
            PlayerControl::Push { x, y } => {
                let len = x.hypot(y);
                if len > 0.0 && len.is_finite() {
                    let scale = tuning.push_acceleration / len;
                    engine.set_acceleration(x * scale, y * scale);
                } else {
                    engine.reset_acceleration();
                }
            }
            PlayerControl::StopPushing => engine.stop_pushing(),
            PlayerControl::SetAngle(degrees) => engine.set_angle(degrees),
            PlayerControl::Fire => {
                if !body.weapons().fire() {
                    debug!(body = %id, "fire ignored: no weapons");
                }
            }
            PlayerControl::SelectNextWeapon => {
                let active = body.weapons_mut().select_next();
                debug!(body = %id, ?active, "weapon selected");
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.paused {
            info!(tick = self.tick_counter, "simulation paused");
        }
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            info!(tick = self.tick_counter, "simulation resumed");
        }
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    // -- ticking ------------------------------------------------------------

    /// Advance the simulation by one fixed step.
    pub fn tick(&mut self) -> &TickDiagnostics {
        if self.paused {
            self.last_diagnostics = TickDiagnostics {
                tick: self.tick_counter,
                paused: true,
                ..TickDiagnostics::default()
            };
            return &self.last_diagnostics;
        }

        let tick_start = Instant::now();
        self.tick_counter += 1;
        let _span = debug_span!("tick", tick = self.tick_counter).entered();
        let ctx = TickContext {
            now_ns: self.now_ns(),
            dt: self.config.fixed_dt,
            bounds: self.world.bounds(),
            collision_radius_factor: self.config.collision_radius_factor,
            immunity_secs: self.config.projectile_immunity_secs,
        };
        let mut phase_times = Vec::with_capacity(5);

        // Phase 1: integrate.
        let start = Instant::now();
        let slots = self.world.slots();
        if self.config.parallel {
            slots
                .par_iter()
                .filter_map(Option::as_ref)
                .for_each(|body| integrate_body(body, &ctx));
        } else {
            slots
                .iter()
                .filter_map(Option::as_ref)
                .for_each(|body| integrate_body(body, &ctx));
        }
        phase_times.push(("integrate", start.elapsed()));

        // Phase 2: re-index.
        let start = Instant::now();
        self.world.refresh_grid();
        phase_times.push(("grid", start.elapsed()));

        // Phase 3: collisions and emissions.
        let start = Instant::now();
        let world = &self.world;
        if self.config.parallel {
            world
                .slots()
                .par_iter()
                .filter_map(Option::as_ref)
                .for_each_init(Vec::new, |neighbors, body| {
                    scan_body(body, world, &ctx, neighbors)
                });
        } else {
            let mut neighbors = Vec::new();
            for body in world.bodies() {
                scan_body(body, world, &ctx, &mut neighbors);
            }
        }
        phase_times.push(("scan", start.elapsed()));

        // Phase 4: rules over the ordered batch.
        let start = Instant::now();
        self.batch.clear();
        for body in self.world.bodies() {
            self.batch.append(&mut body.events());
        }
        let events = self.batch.len();
        self.rules.provide_actions(&self.batch, &mut self.actions);
        let actions = self.actions.len();
        phase_times.push(("rules", start.elapsed()));

        // Phase 5: apply and publish.
        let start = Instant::now();
        let apply = {
            let rng: &mut dyn RngCore = &mut self.rng;
            let mut apply_ctx = ApplyContext {
                now_ns: ctx.now_ns,
                rng,
            };
            self.actions.apply(&mut self.world, &mut apply_ctx).clone()
        };
        self.world.refresh_snapshots();
        self.batch.clear();
        phase_times.push(("apply", start.elapsed()));

        for &(phase, elapsed) in &phase_times {
            self.profiler.record(phase, elapsed);
        }
        let total_time = tick_start.elapsed();
        self.profiler.record("tick", total_time);

        debug!(
            events,
            actions,
            spawned = apply.spawned.len(),
            died = apply.died.len(),
            alive = self.world.alive_count(),
            "tick complete"
        );
        self.last_diagnostics = TickDiagnostics {
            tick: self.tick_counter,
            paused: false,
            events,
            actions,
            apply,
            phase_times,
            total_time,
        };
        &self.last_diagnostics
    }

    /// Run `count` ticks. Returns the number of actions applied.
    pub fn run_ticks(&mut self, count: u64) -> usize {
        let mut applied = 0;
        for _ in 0..count {
            applied += self.tick().apply.applied;
        }
        applied
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Current simulation time in nanoseconds.
    pub fn now_ns(&self) -> u64 {
        self.tick_counter * self.fixed_dt_ns
    }

    /// Current simulation time in seconds, computed from the tick count.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for setup and tests. Prefer actions and controls
    /// while the simulation is running.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world, self.tick_counter, self.now_ns())
    }

    /// BLAKE3 fingerprint of the current snapshot.
    pub fn state_hash(&self) -> Result<String, EngineError> {
        self.snapshot().hash()
    }

    pub fn spatial_statistics(&self) -> SpatialGridStatistics {
        self.world.grid().statistics()
    }

    pub fn profiling_statistics(&self) -> ProfilingStatistics {
        self.profiler.statistics()
    }

    pub fn reset_profiling(&mut self) {
        self.profiler.reset();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
