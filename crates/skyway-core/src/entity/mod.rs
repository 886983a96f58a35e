//! Identity and classification types for craft and the landmarks they visit.
//!
//! This module provides:
//! - [`CraftId`]: Unique identifier for a craft within an airspace
//! - [`BuildingId`]: Identifier for a building craft can dock with
//! - [`CraftClass`]: Locomotion class, which selects the mover at setup
//! - [`MoverKind`]: The two controlled-regime movement engines
//! - [`Altitude`]: Preferred cruise altitude for idle flying craft
//!
//! Per-type statistics live in [`components`].
//!
//! # Example
//!
//! ```
//! use skyway_core::entity::{CraftClass, CraftId, MoverKind};
//!
//! let id = CraftId::new(42);
//! assert_eq!(id.as_u64(), 42);
//! assert_eq!(CraftClass::Road.mover_kind(), MoverKind::Ground);
//! assert_eq!(CraftClass::Ufo.mover_kind(), MoverKind::Flying);
//! ```

pub mod components;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use components::CraftStats;

/// Craft identifier, unique within an [`Airspace`](crate::airspace::Airspace).
///
/// The numeric order is the order craft are advanced in a batch update.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CraftId(u64);

impl CraftId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for CraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for CraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a building known to the airspace.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingId(u64);

impl BuildingId {
    /// Creates a new `BuildingId` from a raw `u64` value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Locomotion class of a craft.
///
/// The class is fixed for the lifetime of a craft and decides which
/// [`MoverKind`] drives it in the controlled regime.
///
/// # Variants
///
/// - `Ufo`: Alien flyer; destroyed outright when its wreck loses support
/// - `Flying`: Conventional flyer
/// - `Atv`: Ground craft that can leave the road network
/// - `Road`: Ground craft restricted to road tiles
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CraftClass {
    /// Alien flyer
    Ufo,
    /// Conventional flyer
    Flying,
    /// All-terrain ground craft
    Atv,
    /// Road-bound ground craft
    Road,
}

impl CraftClass {
    /// Returns `true` for ground classes.
    #[must_use]
    pub const fn is_ground(self) -> bool {
        matches!(self, Self::Atv | Self::Road)
    }

    /// Returns the movement engine used for this class.
    #[must_use]
    pub const fn mover_kind(self) -> MoverKind {
        if self.is_ground() {
            MoverKind::Ground
        } else {
            MoverKind::Flying
        }
    }
}

impl fmt::Display for CraftClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ufo => write!(f, "Ufo"),
            Self::Flying => write!(f, "Flying"),
            Self::Atv => write!(f, "Atv"),
            Self::Road => write!(f, "Road"),
        }
    }
}

/// Controlled-regime movement engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoverKind {
    /// Free 3D flight with smooth turning and projectile dodging
    Flying,
    /// Surface driving with instant turns and tier-transition waypoints
    Ground,
}

/// Preferred cruise altitude, as a tile tier.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Altitude {
    /// Highest cruise tier
    Highest,
    /// High cruise tier
    High,
    /// Standard cruise tier
    #[default]
    Standard,
    /// Low cruise tier
    Low,
}

impl Altitude {
    /// Returns the tile tier this altitude corresponds to.
    #[must_use]
    pub const fn tier(self) -> i32 {
        match self {
            Self::Highest => 9,
            Self::High => 7,
            Self::Standard => 5,
            Self::Low => 3,
        }
    }
}
