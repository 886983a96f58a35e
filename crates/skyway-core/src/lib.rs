//! # Skyway Core
//!
//! Movement and mission engine for craft in a tile-based open-world
//! simulation.
//!
//! Every craft carries a queue of missions that decide where it should go
//! next, and one of two movement engines that get it there: smooth 3D
//! flight, or surface driving with tier transitions. Craft that lose control
//! fall, slide and crash under simple ballistic rules, and may plow through
//! the scenery on the way down.
//!
//! ## Architecture
//!
//! - **Airspace**: registry of craft, batch updates, cross-craft bookkeeping
//! - **Craft**: physical state, the mission queue, damage and docking
//! - **Missions**: per-type start, update, goal production and finish rules
//! - **Movers**: controlled flight and driving, plus the falling, sliding,
//!   wrecked and carried regimes shared by both
//! - **Terrain / WorldView**: what the engine may ask of the map and of
//!   other craft
//!
//! The simulation is deterministic: the airspace owns the only random
//! stream, seeded at construction, and updates craft in ID order.
//!
//! ## Usage
//!
//! ```
//! use glam::{IVec3, Vec3};
//! use skyway_core::{Airspace, CraftClass, CraftStats, GridTerrain, Mission, MoverConfig, Scenery};
//!
//! let mut terrain = GridTerrain::new(IVec3::new(16, 16, 8));
//! terrain.fill_layer(0, Scenery::ground);
//!
//! let mut airspace = Airspace::new(MoverConfig::default(), 1);
//! let id = airspace.spawn("Hawk", CraftClass::Flying, CraftStats::default(), Vec3::new(2.5, 2.5, 5.5));
//! airspace
//!     .add_mission(&mut terrain, id, Mission::patrol(false, 2), true)
//!     .unwrap();
//! let events = airspace.update(&mut terrain, 144);
//! assert!(events.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod airspace;
pub mod config;
pub mod craft;
pub mod entity;
pub mod error;
pub mod event;
pub mod mission;
pub mod mover;
pub mod terrain;
pub mod world_view;

pub use airspace::Airspace;
pub use config::MoverConfig;
pub use craft::{Craft, Regime};
pub use entity::{Altitude, BuildingId, CraftClass, CraftId, CraftStats, MoverKind};
pub use error::{ConfigError, PlacementError};
pub use event::CraftEvent;
pub use mission::{Blockers, Goal, Mission, MissionKind, MissionType};
pub use mover::{MotionReport, Mover};
pub use terrain::{EnterQuery, GridTerrain, Scenery, Terrain, WalkMode};
pub use world_view::{Building, CraftSnapshot, Landmarks, Projectile, SimContext, WorldView};

#[cfg(test)]
mod tests;
