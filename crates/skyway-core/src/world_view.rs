//! Read-only snapshot of the world around a craft, plus the per-update
//! context handed to craft, missions and movers.
//!
//! During a batch update every craft sees the same [`WorldView`]: the state
//! of all craft as it was when the batch began, the live projectiles, and
//! the buildings and portals of the map. Reads of other craft are therefore
//! stale by up to one batch, which the mover tolerates.
//!
//! Cross-craft effects (attaching, releasing, stowing) are never applied
//! through the view. They are emitted as [`CraftEvent`]s and applied by the
//! [`Airspace`](crate::airspace::Airspace) once the batch is over.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use skyway_core::world_view::{Landmarks, WorldView};
//!
//! let crafts = BTreeMap::new();
//! let landmarks = Landmarks::default();
//! let view = WorldView::new(&crafts, &[], &landmarks, 0);
//! assert!(view.portals().is_empty());
//! ```

use std::collections::BTreeMap;

use glam::{IVec3, Vec3};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::MoverConfig;
use crate::craft::Regime;
use crate::entity::{BuildingId, CraftClass, CraftId};
use crate::event::CraftEvent;
use crate::terrain::Terrain;

// =============================================================================
// Snapshots
// =============================================================================

/// What other craft may know about a craft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CraftSnapshot {
    /// World position.
    pub position: Vec3,
    /// Heading in radians.
    pub facing: f32,
    /// Physical regime.
    pub regime: Regime,
    /// Locomotion class.
    pub class: CraftClass,
    /// Building the craft is parked in, if any.
    pub current_building: Option<BuildingId>,
    /// Craft carrying this one, if any.
    pub carried_by: Option<CraftId>,
    /// Whether the craft is still alive.
    pub alive: bool,
}

impl CraftSnapshot {
    /// Returns `true` if the craft is downed (falling, sliding or crashed).
    #[must_use]
    pub fn is_downed(&self) -> bool {
        self.regime != Regime::Controlled
    }
}

/// An in-flight projectile, as far as the dodge heuristic cares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// World position.
    pub position: Vec3,
    /// Velocity in tiles per second.
    pub velocity: Vec3,
    /// Total lifetime in ticks.
    pub lifetime: u32,
    /// Ticks since launch.
    pub age: u32,
    /// Craft that fired it.
    pub firer: Option<CraftId>,
    /// Craft it is homing on.
    pub tracked: Option<CraftId>,
    /// Homing turn rate. Zeroed when the tracked craft dies.
    pub turn_rate: f32,
}

impl Projectile {
    /// Creates an unguided projectile.
    #[must_use]
    pub fn new(position: Vec3, velocity: Vec3, lifetime: u32) -> Self {
        Self {
            position,
            velocity,
            lifetime,
            age: 0,
            firer: None,
            tracked: None,
            turn_rate: 0.0,
        }
    }
}

/// A building craft can dock with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    /// Identifier.
    pub id: BuildingId,
    /// Pad tiles flying craft land on and launch from.
    pub landing_pads: Vec<IVec3>,
    /// Tiles ground craft enter and leave through.
    pub car_entrances: Vec<IVec3>,
}

impl Building {
    /// Tile a craft of `class` appears on when it leaves the building.
    #[must_use]
    pub fn exit_tile(&self, class: CraftClass) -> Option<IVec3> {
        if class.is_ground() {
            self.car_entrances.first().copied()
        } else {
            self.landing_pads.first().copied()
        }
    }
}

/// Static map features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmarks {
    /// Buildings by id.
    pub buildings: BTreeMap<BuildingId, Building>,
    /// Portal tiles.
    pub portals: Vec<IVec3>,
}

// =============================================================================
// WorldView
// =============================================================================

/// Read-only view of everything outside the craft being updated.
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    crafts: &'a BTreeMap<CraftId, CraftSnapshot>,
    projectiles: &'a [Projectile],
    landmarks: &'a Landmarks,
    now: u64,
}

impl<'a> WorldView<'a> {
    /// Creates a view over the given snapshot.
    #[must_use]
    pub fn new(
        crafts: &'a BTreeMap<CraftId, CraftSnapshot>,
        projectiles: &'a [Projectile],
        landmarks: &'a Landmarks,
        now: u64,
    ) -> Self {
        Self {
            crafts,
            projectiles,
            landmarks,
            now,
        }
    }

    /// Current simulation time in ticks.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Snapshot of a live craft.
    #[must_use]
    pub fn craft(&self, id: CraftId) -> Option<&'a CraftSnapshot> {
        self.crafts.get(&id).filter(|c| c.alive)
    }

    /// All craft snapshots in id order.
    pub fn crafts(&self) -> impl Iterator<Item = (CraftId, &'a CraftSnapshot)> {
        self.crafts.iter().map(|(id, c)| (*id, c))
    }

    /// In-flight projectiles.
    #[must_use]
    pub const fn projectiles(&self) -> &'a [Projectile] {
        self.projectiles
    }

    /// A building by id.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&'a Building> {
        self.landmarks.buildings.get(&id)
    }

    /// Portal tiles.
    #[must_use]
    pub fn portals(&self) -> &'a [IVec3] {
        &self.landmarks.portals
    }
}

// =============================================================================
// SimContext
// =============================================================================

/// Everything one craft update may touch besides the craft itself.
pub struct SimContext<'a> {
    /// Terrain queries; plow-throughs damage it.
    pub terrain: &'a mut dyn Terrain,
    /// Snapshot of the rest of the world.
    pub view: WorldView<'a>,
    /// Tuning values.
    pub config: &'a MoverConfig,
    /// The airspace's random stream.
    pub rng: &'a mut ChaCha8Rng,
    /// Events raised so far in this batch.
    pub events: &'a mut Vec<CraftEvent>,
}

impl SimContext<'_> {
    /// Records an event.
    pub fn emit(&mut self, event: CraftEvent) {
        self.events.push(event);
    }

    /// Current simulation time in ticks.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.view.now()
    }

    /// Rolls a `percent` chance.
    pub fn roll_percent(&mut self, percent: f32) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let roll = self.rng.gen_range(0..100) as f32;
        roll < percent
    }

    /// Returns `true` with probability `1/n`.
    pub fn one_in(&mut self, n: u32) -> bool {
        self.rng.gen_range(0..n.max(1)) == 0
    }
}

impl std::fmt::Debug for SimContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimContext")
            .field("view", &self.view)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}
