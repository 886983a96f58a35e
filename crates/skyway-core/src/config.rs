//! Tuning values for the movement engine.
//!
//! Every constant the mover and mission logic consult lives here so that it
//! can be overridden from data. The defaults reproduce the stock behaviour.
//!
//! # Units
//!
//! - Positions are in tiles.
//! - Speeds are in tiles per second; one second is
//!   [`MoverConfig::ticks_per_second`] ticks.
//! - Angles are radians.
//!
//! # Example
//!
//! ```
//! use skyway_core::config::MoverConfig;
//!
//! let config = MoverConfig::from_json(r#"{ "dodge": { "chance_percent": 100 } }"#).unwrap();
//! assert_eq!(config.dodge.chance_percent, 100);
//! assert_eq!(config.ticks_per_second, 144);
//! ```

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration for craft movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoverConfig {
    /// Simulation ticks per second.
    pub ticks_per_second: u32,
    /// Minimum ticks between two runs of the idle heuristics.
    pub auto_action_delay: u64,
    /// Turning behaviour.
    pub turning: TurningConfig,
    /// Ballistic and sliding integration.
    pub falling: FallingConfig,
    /// Plow-through resolution.
    pub plow: PlowConfig,
    /// Terrain collision damage.
    pub collision: CollisionConfig,
    /// Projectile dodging.
    pub dodge: DodgeConfig,
    /// Mission defaults.
    pub missions: MissionConfig,
    /// Optional behaviour switches.
    pub features: FeatureFlags,
}

impl Default for MoverConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: 144,
            auto_action_delay: 36,
            turning: TurningConfig::default(),
            falling: FallingConfig::default(),
            plow: PlowConfig::default(),
            collision: CollisionConfig::default(),
            dodge: DodgeConfig::default(),
            missions: MissionConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

impl MoverConfig {
    /// Parses a config from JSON, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input and
    /// [`ConfigError::Invalid`] when a value fails [`validate`](Self::validate).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that values the integrators divide by are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ticks_per_second == 0 {
            return Err(ConfigError::Invalid {
                field: "ticks_per_second",
                reason: "must be positive",
            });
        }
        if self.falling.horizontal_drag_divisor <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "falling.horizontal_drag_divisor",
                reason: "must be positive",
            });
        }
        if self.collision.evade_one_in == 0 {
            return Err(ConfigError::Invalid {
                field: "collision.evade_one_in",
                reason: "must be at least 1",
            });
        }
        if self.dodge.chance_percent > 100 {
            return Err(ConfigError::Invalid {
                field: "dodge.chance_percent",
                reason: "must be at most 100",
            });
        }
        Ok(())
    }

    /// Ticks per second as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn tps(&self) -> f32 {
        self.ticks_per_second as f32
    }

    /// Ticks in one in-game hour.
    #[must_use]
    pub const fn ticks_per_hour(&self) -> u32 {
        self.ticks_per_second * 3600
    }
}

/// Turning constants for the flying mover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurningConfig {
    /// Angular velocity (rad/tick) per tile/second of craft speed.
    pub rate_per_speed: f32,
    /// Backwards nudge applied when a turn starts, so the first animation
    /// frame is as long as the others.
    pub start_nudge: f32,
    /// Extra angle added to the turn duration.
    pub overshoot: f32,
    /// Ticks subtracted from the translation time before comparing it with
    /// the turn time.
    pub velocity_margin_ticks: i64,
}

impl Default for TurningConfig {
    fn default() -> Self {
        Self {
            rate_per_speed: PI / 216.0,
            start_nudge: 0.06 * PI,
            overshoot: 0.12 * PI,
            velocity_margin_ticks: 5,
        }
    }
}

/// Falling and sliding integration constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallingConfig {
    /// Downward acceleration per tick, in tiles/second.
    pub gravity: f32,
    /// Horizontal drag while falling is `gravity / horizontal_drag_divisor`.
    pub horizontal_drag_divisor: f32,
    /// Horizontal deceleration per tick while sliding.
    pub sliding_deceleration: f32,
    /// A slide onto lower "into" terrain from above this fraction of a tier
    /// turns back into a fall.
    pub slide_drop_height: f32,
    /// Percent chance per tick of shedding a debris doodad when badly hurt.
    pub debris_chance_percent: u32,
    /// Debris is shed while `max_health / health` is at least this.
    pub debris_health_ratio: i32,
    /// Carried craft hang this far below their carrier.
    pub carried_offset: f32,
}

impl Default for FallingConfig {
    fn default() -> Self {
        Self {
            gravity: 0.08,
            horizontal_drag_divisor: 8.0,
            sliding_deceleration: 0.08,
            slide_drop_height: 0.15,
            debris_chance_percent: 2,
            debris_health_ratio: 3,
            carried_offset: 0.5,
        }
    }
}

/// Plow-through odds: `flat + speed_mult * weight * weight_multiplier -
/// constitution * constitution_multiplier`, in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlowConfig {
    /// Flat percentage.
    pub flat: f32,
    /// Percentage per unit of weight.
    pub weight_multiplier: f32,
    /// Percentage removed per point of scenery constitution.
    pub constitution_multiplier: f32,
    /// Speed (tiles/second) above which the high-speed multiplier applies.
    pub high_speed_threshold: f32,
    /// Weight term multiplier at high speed.
    pub high_speed_multiplier: f32,
    /// Scenery at least this tall (in voxels) blocks sideways motion.
    pub tall_scenery_height: i32,
}

impl Default for PlowConfig {
    fn default() -> Self {
        Self {
            flat: 50.0,
            weight_multiplier: 1.0 / 125.0,
            constitution_multiplier: 2.0,
            high_speed_threshold: 10.0,
            high_speed_multiplier: 1.5,
            tall_scenery_height: 12,
        }
    }
}

/// Terrain collision damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Minimum damage as a fraction of max health.
    pub min_fraction: f32,
    /// Cap on constitution-derived damage.
    pub limit: f32,
    /// Damage per point of scenery constitution.
    pub constitution_multiplier: f32,
    /// One in this many collisions deals no damage.
    pub evade_one_in: u32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            min_fraction: 0.05,
            limit: 50.0,
            constitution_multiplier: 2.0,
            evade_one_in: 8,
        }
    }
}

/// Incoming-projectile dodge heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DodgeConfig {
    /// Percent chance per idle pass of scanning for projectiles.
    pub chance_percent: u32,
    /// Own projectiles younger than this are ignored.
    pub own_projectile_grace_ticks: u32,
    /// Hits this close to the centre line allow dodging either way.
    pub centre_tolerance: f32,
    /// Smallest allowed angle between incoming line and dodge direction.
    pub min_angle: f32,
    /// Largest allowed angle between incoming line and dodge direction.
    pub max_angle: f32,
    /// Flying craft below this height never run idle heuristics.
    pub min_idle_height: f32,
}

impl Default for DodgeConfig {
    fn default() -> Self {
        Self {
            chance_percent: 80,
            own_projectile_grace_ticks: 36,
            centre_tolerance: 0.125,
            min_angle: PI / 2.0,
            max_angle: 1.5 * PI / 2.0,
            min_idle_height: 2.0,
        }
    }
}

/// Mission defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Re-route budget for `GotoLocation`.
    pub reroute_attempts: u32,
    /// Node budget for one path search.
    pub path_iterations: usize,
    /// Teleport landing spread around the target, in tiles.
    pub teleporter_spread: i32,
    /// Ticks a teleporter needs to recharge.
    pub teleport_recharge_ticks: u32,
    /// Self-destruct timer in hours.
    pub self_destruct_hours: u32,
    /// Patrol radius around the home building.
    pub patrol_home_radius: i32,
    /// Default number of patrol legs.
    pub patrol_legs: u32,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            reroute_attempts: 20,
            path_iterations: 2000,
            teleporter_spread: 10,
            teleport_recharge_ticks: 144 * 10,
            self_destruct_hours: 12,
            patrol_home_radius: 10,
            patrol_legs: 10,
        }
    }
}

/// Optional behaviours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Ground craft driving off an edge fall instead of being destroyed.
    pub crashing_ground_vehicles: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            crashing_ground_vehicles: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(MoverConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = MoverConfig::from_json(r#"{ "plow": { "flat": 10.0 } }"#).unwrap();
        assert_eq!(config.plow.flat, 10.0);
        assert_eq!(config.plow.tall_scenery_height, 12);
        assert_eq!(config.dodge.chance_percent, 80);
    }

    #[test]
    fn zero_tick_rate_rejected() {
        let err = MoverConfig::from_json(r#"{ "ticks_per_second": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "ticks_per_second",
                ..
            }
        ));
    }

    #[test]
    fn malformed_json_rejected() {
        let err = MoverConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn self_destruct_timer_in_ticks() {
        let config = MoverConfig::default();
        assert_eq!(
            config.ticks_per_hour() * config.missions.self_destruct_hours,
            144 * 3600 * 12
        );
    }

    #[test]
    fn serialization_roundtrip() {
        let config = MoverConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back = MoverConfig::from_json(&json).unwrap();
        assert_eq!(config, back);
    }
}
