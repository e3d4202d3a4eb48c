//! Initial world population.
//!
//! A [`WorldDefinitionProvider`] supplies the bodies a simulation starts
//! with, each optionally carrying emitters, weapons and a trail. The stock
//! provider parses a JSON document:
//!
//! ```
//! use stardrift_engine::world_def::{JsonWorldDefinition, WorldDefinitionProvider};
//!
//! let json = r#"{ "bodies": [
//!     { "body_type": "Player", "asset_id": "ship", "x": 100.0, "y": 100.0, "size": 30.0 },
//!     { "body_type": "Static", "asset_id": "sun", "x": 400.0, "y": 300.0, "size": 80.0 }
//! ] }"#;
//! let def = JsonWorldDefinition::new(json).provide().unwrap();
//! assert_eq!(def.bodies.len(), 2);
//! ```

use serde::{Deserialize, Serialize};

use stardrift_core::body::{BodySpec, BodyType, Lifetime};
use stardrift_core::emitter::EmitterConfig;
use stardrift_core::CoreError;

use crate::EngineError;

/// One body of a world definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDef {
    pub body_type: BodyType,
    pub asset_id: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub speed_x: f64,
    pub speed_y: f64,
    pub angle: f64,
    pub angular_speed: f64,
    pub thrust: f64,
    pub mass: f64,
    /// Seconds, `-1` for unlimited.
    pub max_life: f64,
    pub emitters: Vec<EmitterConfig>,
    /// Only valid on players.
    pub weapons: Vec<EmitterConfig>,
    pub trail: Option<EmitterConfig>,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            asset_id: String::new(),
            x: 0.0,
            y: 0.0,
            size: 1.0,
            speed_x: 0.0,
            speed_y: 0.0,
            angle: 0.0,
            angular_speed: 0.0,
            thrust: 0.0,
            mass: 1.0,
            max_life: -1.0,
            emitters: Vec::new(),
            weapons: Vec::new(),
            trail: None,
        }
    }
}

impl BodyDef {
    pub fn to_spec(&self) -> Result<BodySpec, EngineError> {
        Ok(
            BodySpec::new(self.body_type, &self.asset_id, self.x, self.y, self.size)
                .with_speed(self.speed_x, self.speed_y)
                .with_angle(self.angle)
                .with_angular_speed(self.angular_speed)
                .with_thrust(self.thrust)
                .with_mass(self.mass)
                .with_max_life(Lifetime::from_raw(self.max_life)?),
        )
    }

    /// Check every emitter, weapon and trail config, and that only players
    /// carry weapons.
    pub fn validate_equipment(&self) -> Result<(), EngineError> {
        if !self.weapons.is_empty() && self.body_type != BodyType::Player {
            return Err(CoreError::InvalidConfig {
                what: "world definition",
                details: format!(
                    "{:?} body '{}' carries weapons; only players can",
                    self.body_type, self.asset_id
                ),
            }
            .into());
        }
        for config in self.emitters.iter().chain(&self.weapons).chain(&self.trail) {
            config.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldDefinition {
    pub bodies: Vec<BodyDef>,
}

/// Source of the initial world population.
pub trait WorldDefinitionProvider {
    fn provide(&self) -> Result<WorldDefinition, EngineError>;
}

impl WorldDefinitionProvider for WorldDefinition {
    fn provide(&self) -> Result<WorldDefinition, EngineError> {
        Ok(self.clone())
    }
}

/// World definition held as a JSON document.
#[derive(Debug, Clone)]
pub struct JsonWorldDefinition(String);

impl JsonWorldDefinition {
    pub fn new(json: impl Into<String>) -> Self {
        Self(json.into())
    }
}

impl WorldDefinitionProvider for JsonWorldDefinition {
    fn provide(&self) -> Result<WorldDefinition, EngineError> {
        Ok(serde_json::from_str(&self.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let def = JsonWorldDefinition::new(
            r#"{ "bodies": [ { "asset_id": "rock", "x": 5.0, "y": 6.0, "speed_x": 2.0 } ] }"#,
        )
        .provide()
        .unwrap();
        let spec = def.bodies[0].to_spec().unwrap();
        assert_eq!(spec.body_type, BodyType::Dynamic);
        assert_eq!(spec.max_life, Lifetime::Unlimited);
        assert_eq!(spec.initial.speed_x, 2.0);
        assert_eq!(spec.initial.size, 1.0);
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        let def = BodyDef {
            max_life: 0.0,
            ..Default::default()
        };
        assert!(matches!(def.to_spec(), Err(EngineError::Core(_))));
    }

    #[test]
    fn weapons_are_for_players_only() {
        let gun = EmitterConfig::single_shot(
            4.0,
            stardrift_core::spawn::SpawnConfig::projectile("bolt", 2.0, 100.0),
        );
        let mut def = BodyDef {
            asset_id: "rock".into(),
            weapons: vec![gun],
            ..Default::default()
        };
        assert!(matches!(
            def.validate_equipment(),
            Err(EngineError::Core(CoreError::InvalidConfig { .. }))
        ));
        def.body_type = BodyType::Player;
        assert!(def.validate_equipment().is_ok());

        def.weapons[0].emission_rate = -1.0;
        assert!(def.validate_equipment().is_err());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            JsonWorldDefinition::new("{ bodies: ").provide(),
            Err(EngineError::Json(_))
        ));
    }
}
