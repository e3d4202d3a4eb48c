//! External control requests.
//!
//! Input handlers and hosts never touch bodies directly while a tick runs;
//! they describe what they want as a [`ControlCommand`] which the simulation
//! applies between ticks (directly via
//! [`Simulation::control`](crate::simulation::Simulation::control), or through
//! the runner's channel).

use stardrift_core::body::BodyId;

/// Player ship inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerControl {
    ThrustOn,
    ThrustReverse,
    ThrustOff,
    RotateLeft,
    RotateRight,
    RotateOff,
    /// Accelerate along `(x, y)`; the vector is normalised.
    Push { x: f64, y: f64 },
    /// Drop every push and thrust.
    StopPushing,
    /// Face `degrees` immediately.
    SetAngle(f64),
    /// Request a shot from the active weapon.
    Fire,
    SelectNextWeapon,
}

/// A request applied between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Player { body: BodyId, control: PlayerControl },
    PauseBody(BodyId),
    ResumeBody(BodyId),
    /// Freeze the whole simulation clock.
    Pause,
    Resume,
}
