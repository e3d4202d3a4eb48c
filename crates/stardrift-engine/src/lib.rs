//! Stardrift engine -- the tick driver around `stardrift-core`.
//!
//! [`Simulation`](simulation::Simulation) owns the body arena, the
//! simulation clock, the seeded RNG and the pluggable rules. Each tick it
//! integrates every body in parallel, refreshes the spatial grid, detects
//! collisions and emissions in parallel, hands the ordered event batch to the
//! [`ActionsGenerator`](rules::ActionsGenerator) and applies the returned
//! actions. [`SimulationRunner`](runner::SimulationRunner) runs that loop on a
//! background thread at a fixed cadence.
//!
//! # Quick Start
//!
//! ```
//! use stardrift_engine::prelude::*;
//!
//! let config = SimulationConfig::default();
//! let mut sim = Simulation::new(config, ReboundCollisionPlayerImmunity).unwrap();
//!
//! let rock = sim
//!     .add_body(BodySpec::dynamic("rock", 100.0, 100.0, 20.0).with_speed(50.0, 0.0))
//!     .unwrap();
//! sim.run_ticks(60);
//!
//! assert_eq!(sim.tick_count(), 60);
//! assert!(sim.world().get(rock).unwrap().physics().pos_x > 100.0);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod control;
pub mod profiler;
pub mod rules;
pub mod runner;
pub mod simulation;
pub mod snapshot;
pub mod world_def;

use stardrift_core::CoreError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A configuration value failed validation.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// A JSON document could not be parsed or serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A core operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The background runner has stopped and no longer accepts commands.
    #[error("simulation runner has stopped")]
    RunnerStopped,
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::{PlayerTuning, SimulationConfig};
    pub use crate::control::{ControlCommand, PlayerControl};
    pub use crate::profiler::{PhaseStatistics, Profiler, ProfilingStatistics};
    pub use crate::rules::{
        ActionsGenerator, DeadInLimitsPlayerImmunity, LimitRebound, ReboundCollisionPlayerImmunity,
    };
    pub use crate::runner::{SimulationHandle, SimulationRunner, SnapshotBoard};
    pub use crate::simulation::{Simulation, TickDiagnostics};
    pub use crate::snapshot::{BodySnapshot, PlayerSnapshot, WorldSnapshot};
    pub use crate::world_def::{
        BodyDef, JsonWorldDefinition, WorldDefinition, WorldDefinitionProvider,
    };
    pub use crate::EngineError;
    pub use stardrift_core::prelude::*;
}
