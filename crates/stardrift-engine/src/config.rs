//! Simulation configuration.
//!
//! All bootstrap parameters live in one serde-friendly struct so a host can
//! ship them as JSON. Every field has a default; [`SimulationConfig::validate`]
//! rejects inconsistent values up front instead of silently correcting them.
//!
//! # Example
//!
//! ```
//! use stardrift_engine::config::SimulationConfig;
//!
//! let config = SimulationConfig::from_json_str(
//!     r#"{ "world_width": 800.0, "world_height": 600.0, "max_bodies": 200 }"#,
//! )
//! .unwrap();
//! assert_eq!(config.max_bodies, 200);
//! assert_eq!(config.cell_size, 128.0);
//! ```

use serde::{Deserialize, Serialize};

use stardrift_core::physics::{Damping, WorldBounds};
use stardrift_core::world::World;

use crate::EngineError;

/// Player control strengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Thrust applied by `ThrustOn`, in acceleration units.
    pub max_thrust: f64,
    /// Degrees per second applied by the rotate controls.
    pub angular_speed: f64,
    /// Acceleration applied by directional pushes.
    pub push_acceleration: f64,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_thrust: 1000.0,
            angular_speed: 30.0,
            push_acceleration: 1000.0,
        }
    }
}

/// Parameters of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub world_width: f64,
    pub world_height: f64,
    /// Live body cap; spawns beyond it are no-ops.
    pub max_bodies: usize,
    /// Grid cell side. Should be at least the largest common body diameter.
    pub cell_size: f64,
    pub max_cells_per_body: usize,
    /// Seconds of simulated time per tick.
    pub fixed_dt: f64,
    /// Upper bound on the elapsed time integrated in one step.
    pub max_dt: f64,
    /// Fraction of the nominal radius used by the overlap test.
    pub collision_radius_factor: f64,
    /// Seconds during which a projectile ignores its own shooter.
    pub projectile_immunity_secs: f64,
    pub vehicle_damping: Damping,
    pub projectile_damping: Damping,
    pub player: PlayerTuning,
    pub rng_seed: u64,
    /// Run the per-body phases on the rayon pool.
    pub parallel: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            world_width: 2000.0,
            world_height: 2000.0,
            max_bodies: 5000,
            cell_size: 128.0,
            max_cells_per_body: 1512,
            fixed_dt: 1.0 / 60.0,
            max_dt: 0.5,
            collision_radius_factor: 0.9,
            projectile_immunity_secs: 0.5,
            vehicle_damping: Damping::vehicle(),
            projectile_damping: Damping::projectile(),
            player: PlayerTuning::default(),
            rng_seed: 0,
            parallel: true,
        }
    }
}

impl SimulationConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// A config without drag, for exact kinematics.
    pub fn frictionless() -> Self {
        Self {
            vehicle_damping: Damping::none(),
            projectile_damping: Damping::none(),
            ..Self::default()
        }
    }

    pub fn bounds(&self) -> WorldBounds {
        WorldBounds::new(self.world_width, self.world_height)
    }

    /// Duration of one tick in whole nanoseconds.
    pub fn fixed_dt_ns(&self) -> u64 {
        (self.fixed_dt * 1e9).round() as u64
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(EngineError::InvalidConfig(format!(
                    "{name} must be positive and finite, got {v}"
                )))
            }
        };
        positive("world_width", self.world_width)?;
        positive("world_height", self.world_height)?;
        positive("cell_size", self.cell_size)?;
        positive("fixed_dt", self.fixed_dt)?;
        positive("max_dt", self.max_dt)?;
        positive("collision_radius_factor", self.collision_radius_factor)?;

        if self.max_bodies == 0 {
            return Err(EngineError::InvalidConfig("max_bodies must be at least 1".into()));
        }
        if self.max_cells_per_body == 0 {
            return Err(EngineError::InvalidConfig(
                "max_cells_per_body must be at least 1".into(),
            ));
        }
        if self.max_dt < self.fixed_dt {
            return Err(EngineError::InvalidConfig(format!(
                "max_dt ({}) must not be smaller than fixed_dt ({})",
                self.max_dt, self.fixed_dt
            )));
        }
        if self.collision_radius_factor > 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "collision_radius_factor must be in (0, 1], got {}",
                self.collision_radius_factor
            )));
        }
        if !(self.projectile_immunity_secs.is_finite() && self.projectile_immunity_secs >= 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "projectile_immunity_secs must be >= 0, got {}",
                self.projectile_immunity_secs
            )));
        }
        for (name, d) in [
            ("vehicle_damping", self.vehicle_damping),
            ("projectile_damping", self.projectile_damping),
        ] {
            let ok = |f: f64| f.is_finite() && f > 0.0 && f <= 1.0;
            if !(ok(d.accelerating) && ok(d.coasting)) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} factors must be in (0, 1], got {d:?}"
                )));
            }
        }
        Ok(())
    }

    /// Build the empty body arena described by this config.
    pub fn build_world(&self) -> Result<World, EngineError> {
        self.validate()?;
        let world = World::new(
            self.bounds(),
            self.max_bodies,
            self.cell_size,
            self.max_cells_per_body,
        )?
        .with_damping(self.vehicle_damping, self.projectile_damping)
        .with_max_dt(self.max_dt);
        Ok(world)
    }
}
