//! Static per-type statistics for craft.
//!
//! Type definitions are loaded by an outer layer; this crate only needs the
//! handful of numbers the mover and damage model consult.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Statistics of a craft type plus fitted equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftStats {
    /// Top speed in tiles per second.
    pub top_speed: f32,
    /// Total weight including equipment.
    pub weight: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Health at or below which the craft is downed. Zero disables downing.
    pub crash_health: i32,
    /// Footprint in tiles.
    pub size: Vec2,
    /// Whether a teleporter is fitted.
    pub teleporter: bool,
}

impl Default for CraftStats {
    fn default() -> Self {
        Self {
            top_speed: 12.0,
            weight: 2000,
            max_health: 100,
            crash_health: 0,
            size: Vec2::ONE,
            teleporter: false,
        }
    }
}

impl CraftStats {
    /// Weight as used by the plow-through roll.
    ///
    /// A craft with no weight is a broken type definition; it is logged and
    /// contributes nothing.
    #[must_use]
    pub fn effective_weight(&self) -> f32 {
        if self.weight <= 0 {
            warn!(weight = self.weight, "craft type has no weight");
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let weight = self.weight as f32;
        weight
    }

    /// Radius around the craft centre that a projectile must pass within.
    #[must_use]
    pub fn hit_radius(&self) -> f32 {
        self.size.x.max(self.size.y) * 1.41 / 2.0
    }

    /// Health cap applied when the craft crashes.
    #[must_use]
    pub fn wreck_health(&self) -> i32 {
        if self.crash_health > 0 {
            self.crash_health
        } else {
            self.max_health / 10
        }
    }
}
