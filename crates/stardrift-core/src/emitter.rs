//! Emission cooldown, burst and ammunition state machine.
//!
//! An [`Emitter`] decides once per tick whether its body should spawn
//! something. Demand arrives through [`Emitter::register_request`], which may
//! be called from any thread (input handlers, rules, the tick itself);
//! [`Emitter::must_emit_now`] is evaluated by the tick worker that owns the
//! body. All counters are atomics so both sides only need `&Emitter`.
//!
//! Evaluation order of one poll:
//!
//! 1. cooling down: decrement the cooldown, drop pending demand, no emission;
//! 2. out of ammo: start reloading, drop pending demand, no emission;
//! 3. inside a burst: emit the next burst shot;
//! 4. no pending demand: become ready, no emission;
//! 5. pending demand: emit, possibly opening a burst.
//!
//! # Example
//!
//! ```
//! use stardrift_core::emitter::{Emitter, EmitterConfig};
//! use stardrift_core::spawn::SpawnConfig;
//!
//! let config = EmitterConfig::single_shot(10.0, SpawnConfig::projectile("bullet", 2.0, 300.0));
//! let emitter = Emitter::new(config).unwrap();
//!
//! assert!(!emitter.must_emit_now(0.01));
//! emitter.register_request();
//! assert!(emitter.must_emit_now(0.01));
//! // Cooling down now; the same request is not honoured twice.
//! assert!(!emitter.must_emit_now(0.01));
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::spawn::SpawnConfig;
use crate::CoreError;

// ---------------------------------------------------------------------------
// EmitterConfig
// ---------------------------------------------------------------------------

/// Immutable emitter parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitterConfig {
    /// Emissions per second outside bursts.
    pub emission_rate: f64,
    /// When `false`, at most `max_ammo` emissions happen between reloads.
    #[serde(default = "default_true")]
    pub unlimited_ammo: bool,
    #[serde(default)]
    pub max_ammo: u32,
    /// Shots per burst, including the first one.
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    /// Emissions per second inside a burst.
    #[serde(default)]
    pub burst_rate: f64,
    /// Seconds spent reloading once the ammo runs out.
    #[serde(default)]
    pub reload_time: f64,
    /// What each emission spawns.
    pub spawn: SpawnConfig,
}

fn default_true() -> bool {
    true
}

fn default_burst_size() -> u32 {
    1
}

impl EmitterConfig {
    /// Unlimited single shots at `emission_rate` per second.
    pub fn single_shot(emission_rate: f64, spawn: SpawnConfig) -> Self {
        Self {
            emission_rate,
            unlimited_ammo: true,
            max_ammo: 0,
            burst_size: 1,
            burst_rate: 0.0,
            reload_time: 0.0,
            spawn,
        }
    }

    pub fn with_ammo(mut self, max_ammo: u32, reload_time: f64) -> Self {
        self.unlimited_ammo = false;
        self.max_ammo = max_ammo;
        self.reload_time = reload_time;
        self
    }

    pub fn with_burst(mut self, burst_size: u32, burst_rate: f64) -> Self {
        self.burst_size = burst_size;
        self.burst_rate = burst_rate;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !(self.emission_rate.is_finite() && self.emission_rate > 0.0) {
            return Err(CoreError::invalid(
                "emitter",
                format!("emission rate must be positive, got {}", self.emission_rate),
            ));
        }
        if self.burst_size == 0 {
            return Err(CoreError::invalid("emitter", "burst size must be at least 1"));
        }
        if self.burst_size > 1 && !(self.burst_rate.is_finite() && self.burst_rate > 0.0) {
            return Err(CoreError::invalid(
                "emitter",
                format!("burst rate must be positive, got {}", self.burst_rate),
            ));
        }
        if !self.unlimited_ammo && self.max_ammo == 0 {
            return Err(CoreError::invalid(
                "emitter",
                "limited ammo needs max_ammo >= 1",
            ));
        }
        if !(self.reload_time.is_finite() && self.reload_time >= 0.0) {
            return Err(CoreError::invalid(
                "emitter",
                format!("reload time must be >= 0, got {}", self.reload_time),
            ));
        }
        self.spawn.validate()
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Whether the emitter is available or refilling its ammunition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmitterStatus {
    Ready,
    Reloading,
}

const READY: u8 = 0;
const RELOADING: u8 = 1;

/// Runtime state of one emitter or weapon.
#[derive(Debug)]
pub struct Emitter {
    config: EmitterConfig,
    spawn: Arc<SpawnConfig>,
    /// Seconds, stored as `f64` bits. Never negative.
    cooldown: AtomicU64,
    ammo: AtomicU32,
    burst_remaining: AtomicU32,
    /// Monotonic request stamp; bumped by every `register_request`.
    last_request: AtomicU64,
    /// Highest request stamp already honoured or discarded.
    last_handled: AtomicU64,
    status: AtomicU8,
}

impl Emitter {
    pub fn new(config: EmitterConfig) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            spawn: Arc::new(config.spawn.clone()),
            cooldown: AtomicU64::new(0f64.to_bits()),
            ammo: AtomicU32::new(config.max_ammo),
            burst_remaining: AtomicU32::new(0),
            last_request: AtomicU64::new(0),
            last_handled: AtomicU64::new(0),
            status: AtomicU8::new(READY),
            config,
        })
    }

    /// Record demand for an emission. Safe from any thread.
    pub fn register_request(&self) {
        self.last_request.fetch_add(1, Ordering::AcqRel);
    }

    /// Advance the state machine by `dt` seconds and report whether an
    /// emission happens this tick.
    ///
    /// Must only be called by one thread at a time (the tick worker that owns
    /// the body).
    pub fn must_emit_now(&self, dt: f64) -> bool {
        let cooldown = self.cooldown();
        if cooldown > 0.0 {
            self.set_cooldown(cooldown - dt);
            self.discard_pending();
            return false;
        }

        if !self.config.unlimited_ammo && self.ammo.load(Ordering::Acquire) == 0 {
            self.status.store(RELOADING, Ordering::Release);
            self.set_cooldown(self.config.reload_time);
            self.ammo.store(self.config.max_ammo, Ordering::Release);
            self.burst_remaining.store(0, Ordering::Release);
            self.discard_pending();
            return false;
        }

        let burst = self.burst_remaining.load(Ordering::Acquire);
        if burst > 0 {
            self.discard_pending();
            self.burst_remaining.store(burst - 1, Ordering::Release);
            self.consume_ammo();
            self.set_cooldown(self.next_cooldown(burst - 1 > 0));
            return true;
        }

        let request = self.last_request.load(Ordering::Acquire);
        if request <= self.last_handled.load(Ordering::Acquire) {
            self.set_cooldown(0.0);
            self.status.store(READY, Ordering::Release);
            return false;
        }

        let opens_burst = self.config.burst_size > 1;
        if opens_burst {
            self.burst_remaining
                .store(self.config.burst_size - 1, Ordering::Release);
        }
        self.consume_ammo();
        self.last_handled.store(request, Ordering::Release);
        self.status.store(READY, Ordering::Release);
        self.set_cooldown(self.next_cooldown(opens_burst));
        true
    }

    // -- accessors ----------------------------------------------------------

    pub fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Shared spawn template carried by emission events.
    pub fn spawn(&self) -> &Arc<SpawnConfig> {
        &self.spawn
    }

    pub fn cooldown(&self) -> f64 {
        f64::from_bits(self.cooldown.load(Ordering::Acquire))
    }

    /// Remaining ammunition; meaningless when ammo is unlimited.
    pub fn ammo(&self) -> u32 {
        self.ammo.load(Ordering::Acquire)
    }

    pub fn burst_remaining(&self) -> u32 {
        self.burst_remaining.load(Ordering::Acquire)
    }

    pub fn status(&self) -> EmitterStatus {
        match self.status.load(Ordering::Acquire) {
            RELOADING => EmitterStatus::Reloading,
            _ => EmitterStatus::Ready,
        }
    }

    pub fn has_pending_request(&self) -> bool {
        self.last_request.load(Ordering::Acquire) > self.last_handled.load(Ordering::Acquire)
    }

    /// Remaining ammunition as a fraction of capacity; `1.0` when unlimited.
    pub fn ammo_ratio(&self) -> f64 {
        if self.config.unlimited_ammo {
            1.0
        } else {
            self.ammo() as f64 / self.config.max_ammo as f64
        }
    }

    // -- internals ----------------------------------------------------------

    fn set_cooldown(&self, secs: f64) {
        self.cooldown
            .store(secs.max(0.0).to_bits(), Ordering::Release);
    }

    fn next_cooldown(&self, in_burst: bool) -> f64 {
        if in_burst {
            1.0 / self.config.burst_rate
        } else {
            1.0 / self.config.emission_rate
        }
    }

    fn consume_ammo(&self) {
        if self.config.unlimited_ammo {
            return;
        }
        let _ = self
            .ammo
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |a| a.checked_sub(1));
    }

    fn discard_pending(&self) {
        let request = self.last_request.load(Ordering::Acquire);
        self.last_handled.fetch_max(request, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
