//! Templates for bodies spawned by emitters and weapons.
//!
//! A [`SpawnConfig`] is expressed relative to the emitting body: offsets are
//! measured along and across its heading, speeds and accelerations point along
//! the emitted body's heading. [`SpawnConfig::resolve`] turns the template
//! into a concrete [`BodySpec`] at spawn time. Randomisation happens only
//! there and only for the flags that ask for it.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::body::{BodySpec, BodyType, Lifetime};
use crate::physics::PhysicsState;
use crate::CoreError;

/// Smallest multiple of the template size a random-size spawn can get.
pub const MIN_RANDOM_SIZE_FACTOR: f64 = 0.1;

/// Relative description of a body to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnConfig {
    pub body_type: BodyType,
    pub asset_id: String,
    pub size: f64,
    /// Distance ahead of the emitter along its heading.
    #[serde(default)]
    pub forward_offset: f64,
    /// Distance to the emitter's right, perpendicular to its heading.
    #[serde(default)]
    pub side_offset: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub acceleration: f64,
    #[serde(default)]
    pub angular_speed: f64,
    #[serde(default)]
    pub angular_acc: f64,
    #[serde(default)]
    pub thrust: f64,
    #[serde(default)]
    pub mass: f64,
    #[serde(default)]
    pub max_life: Lifetime,
    /// Pick a uniformly random heading instead of the emitter's.
    #[serde(default)]
    pub random_angle: bool,
    /// Scale the size by a random factor in `[0, 3)`.
    #[serde(default)]
    pub random_size: bool,
    /// Scale a finite lifetime by a random factor in `[0.5, 2.5)`.
    #[serde(default)]
    pub random_life: bool,
    /// Add the emitter's own velocity to the spawned body's.
    #[serde(default)]
    pub add_emitter_speed: bool,
}

impl SpawnConfig {
    pub fn new(body_type: BodyType, asset_id: &str, size: f64) -> Self {
        Self {
            body_type,
            asset_id: asset_id.to_owned(),
            size,
            forward_offset: 0.0,
            side_offset: 0.0,
            speed: 0.0,
            acceleration: 0.0,
            angular_speed: 0.0,
            angular_acc: 0.0,
            thrust: 0.0,
            mass: 0.0,
            max_life: Lifetime::Unlimited,
            random_angle: false,
            random_size: false,
            random_life: false,
            add_emitter_speed: false,
        }
    }

    /// A projectile fired straight ahead at `speed`, inheriting the shooter's
    /// velocity.
    pub fn projectile(asset_id: &str, size: f64, speed: f64) -> Self {
        Self {
            speed,
            add_emitter_speed: true,
            ..Self::new(BodyType::Projectile, asset_id, size)
        }
    }

    /// A short-lived decorator, e.g. exhaust particles.
    pub fn particle(asset_id: &str, size: f64, life_secs: f64) -> Self {
        Self {
            max_life: Lifetime::Seconds(life_secs),
            ..Self::new(BodyType::Decorator, asset_id, size)
        }
    }

    pub fn with_offsets(mut self, forward: f64, side: f64) -> Self {
        self.forward_offset = forward;
        self.side_offset = side;
        self
    }

    pub fn with_max_life(mut self, max_life: Lifetime) -> Self {
        self.max_life = max_life;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.asset_id.is_empty() {
            return Err(CoreError::invalid("spawn config", "asset id is required"));
        }
        if self.body_type == BodyType::Player {
            return Err(CoreError::invalid("spawn config", "players cannot be emitted"));
        }
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(CoreError::invalid(
                "spawn config",
                format!("size must be positive and finite, got {}", self.size),
            ));
        }
        if !(self.mass.is_finite() && self.mass >= 0.0) {
            return Err(CoreError::invalid(
                "spawn config",
                format!("mass must be finite and non-negative, got {}", self.mass),
            ));
        }
        let motion = [
            self.forward_offset,
            self.side_offset,
            self.speed,
            self.acceleration,
            self.angular_speed,
            self.angular_acc,
            self.thrust,
        ];
        if motion.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::invalid("spawn config", "motion parameters must be finite"));
        }
        self.max_life.validate()
    }

    /// Build the concrete body emitted by a body currently in state `origin`.
    ///
    /// The returned spec carries no shooter; the caller sets one for
    /// projectiles.
    pub fn resolve<R: Rng + ?Sized>(&self, origin: &PhysicsState, rng: &mut R) -> BodySpec {
        let (fx, fy) = origin.heading();
        // Right-hand side in a y-down frame.
        let (sx, sy) = (-fy, fx);

        let angle = if self.random_angle {
            rng.gen::<f64>() * 360.0
        } else {
            origin.angle
        };
        let size = if self.random_size {
            self.size * (2.5 * rng.gen::<f64>()).max(MIN_RANDOM_SIZE_FACTOR)
        } else {
            self.size
        };
        let max_life = match self.max_life {
            Lifetime::Seconds(secs) if self.random_life => {
                Lifetime::Seconds(secs * (0.5 + 2.0 * rng.gen::<f64>()))
            }
            life => life,
        };

        let x = origin.pos_x + fx * self.forward_offset + sx * self.side_offset;
        let y = origin.pos_y + fy * self.forward_offset + sy * self.side_offset;

        let mut spec = BodySpec::new(self.body_type, &self.asset_id, x, y, size)
            .with_angle(angle)
            .with_max_life(max_life)
            .with_mass(self.mass)
            .with_angular_speed(self.angular_speed)
            .with_thrust(self.thrust);
        spec.initial.angular_acc = self.angular_acc;

        // A random angle only turns the sprite; motion follows the emitter.
        let (mut vx, mut vy) = (fx * self.speed, fy * self.speed);
        if self.add_emitter_speed {
            vx += origin.speed_x;
            vy += origin.speed_y;
        }
        spec.with_speed(vx, vy)
            .with_acceleration(fx * self.acceleration, fy * self.acceleration)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
