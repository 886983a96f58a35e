//! Test helpers for setting up airspaces and craft.
//!
//! [`Harness`] bundles an [`Airspace`] with an in-memory [`GridTerrain`]
//! and offers the small vocabulary tests use: spawn a craft, hand it a
//! mission, step the clock, look at the result.

use glam::{IVec3, Vec3};

use crate::airspace::Airspace;
use crate::config::MoverConfig;
use crate::craft::Craft;
use crate::entity::{BuildingId, CraftClass, CraftId, CraftStats};
use crate::error::PlacementError;
use crate::event::CraftEvent;
use crate::mission::Mission;
use crate::mover::MotionReport;
use crate::terrain::{GridTerrain, Scenery};
use crate::world_view::{Building, Projectile, SimContext};

/// Fixed seed so every test run draws the same numbers.
pub const TEST_SEED: u64 = 0x5EED;

/// Map extent used by every scenario.
pub const MAP_SIZE: IVec3 = IVec3::new(16, 16, 10);

/// Routes engine logs to the test output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .compact()
        .try_init();
}

// =============================================================================
// Harness
// =============================================================================

/// An airspace over a small map.
pub struct Harness {
    airspace: Airspace,
    terrain: GridTerrain,
}

impl Harness {
    /// Building registered by [`Harness::with_pad`].
    pub const PAD_BUILDING: BuildingId = BuildingId::new(1);

    /// Landing pad tile of [`Harness::PAD_BUILDING`].
    pub const PAD: IVec3 = IVec3::new(2, 2, 2);

    fn build(config: MoverConfig, terrain: GridTerrain) -> Self {
        Self {
            airspace: Airspace::new(config, TEST_SEED),
            terrain,
        }
    }

    fn flat_ground() -> GridTerrain {
        let mut terrain = GridTerrain::new(MAP_SIZE);
        terrain.fill_layer(0, Scenery::ground);
        terrain
    }

    /// Open sky over flat ground at tier 0.
    pub fn open_sky() -> Self {
        Self::build(MoverConfig::default(), Self::flat_ground())
    }

    /// Open sky where idle craft always try to dodge.
    pub fn eager_dodgers() -> Self {
        let mut config = MoverConfig::default();
        config.dodge.chance_percent = 100;
        Self::build(config, Self::flat_ground())
    }

    /// A deck of ground at tier 1 with one building whose landing pad sits
    /// just above it.
    pub fn with_pad() -> Self {
        let mut terrain = Self::flat_ground();
        terrain.fill_layer(1, Scenery::ground);
        let mut h = Self::build(MoverConfig::default(), terrain);
        h.airspace.add_building(Building {
            id: Self::PAD_BUILDING,
            landing_pads: vec![Self::PAD],
            car_entrances: vec![IVec3::new(2, 4, 1)],
        });
        h
    }

    /// Ground at tier 0 under a full road layer at tier 1.
    pub fn roads() -> Self {
        Self::roads_with(|_| {})
    }

    /// [`Harness::roads`] with tweaked tuning.
    pub fn roads_with(tweak: impl FnOnce(&mut MoverConfig)) -> Self {
        let mut config = MoverConfig::default();
        tweak(&mut config);
        let mut terrain = Self::flat_ground();
        terrain.fill_layer(1, Scenery::road);
        Self::build(config, terrain)
    }

    // -------------------------------------------------------------------------
    // Spawning
    // -------------------------------------------------------------------------

    /// Spawns a default flyer.
    pub fn spawn_flyer(&mut self, position: Vec3) -> CraftId {
        self.spawn(CraftClass::Flying, position)
    }

    /// Spawns a craft of `class` with default stats.
    pub fn spawn(&mut self, class: CraftClass, position: Vec3) -> CraftId {
        self.airspace
            .spawn(format!("{class}"), class, CraftStats::default(), position)
    }

    /// Spawns a flyer parked in `building`.
    pub fn spawn_docked(&mut self, building: BuildingId) -> CraftId {
        self.airspace
            .spawn_in_building("Docked", CraftClass::Flying, CraftStats::default(), building)
            .expect("building registered")
    }

    /// A flyer that belongs to no airspace.
    pub fn detached_flyer(&self, position: Vec3) -> Craft {
        Craft::new(CraftId::new(1000), "Detached", CraftClass::Flying, CraftStats::default())
            .with_position(position)
    }

    /// Makes `carrier` carry `carried`.
    pub fn link(&mut self, carrier: CraftId, carried: CraftId) {
        self.craft_mut(carrier).carrying = Some(carried);
        self.craft_mut(carried).carried_by = Some(carrier);
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Places a mission.
    pub fn add_mission(
        &mut self,
        id: CraftId,
        mission: Mission,
        to_back: bool,
    ) -> Result<(), PlacementError> {
        self.airspace.add_mission(&mut self.terrain, id, mission, to_back)
    }

    /// Replaces a craft's missions.
    pub fn set_mission(&mut self, id: CraftId, mission: Mission) -> Result<(), PlacementError> {
        self.airspace.set_mission(&mut self.terrain, id, mission)
    }

    /// Hits a craft. Returns whether it was destroyed.
    pub fn damage(&mut self, id: CraftId, damage: i32, armour: i32) -> bool {
        self.airspace
            .apply_damage(&mut self.terrain, id, damage, armour, None)
            .expect("craft exists")
    }

    // -------------------------------------------------------------------------
    // Stepping
    // -------------------------------------------------------------------------

    /// Steps the whole airspace one tick at a time and collects the events.
    pub fn update(&mut self, ticks: u32) -> Vec<CraftEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(self.airspace.update(&mut self.terrain, 1));
        }
        events
    }

    /// Advances one craft by `ticks` in a single call.
    pub fn update_one(&mut self, id: CraftId, ticks: u32) -> MotionReport {
        self.airspace
            .update_craft(&mut self.terrain, id, ticks)
            .expect("craft exists")
    }

    /// Steps tick by tick until `done` holds or `max_ticks` have passed.
    pub fn run_until(
        &mut self,
        max_ticks: u32,
        mut done: impl FnMut(&Self) -> bool,
    ) -> Vec<CraftEvent> {
        let mut events = Vec::new();
        for _ in 0..max_ticks {
            if done(self) {
                break;
            }
            events.extend(self.airspace.update(&mut self.terrain, 1));
        }
        events
    }

    /// Events raised by commands since the last update.
    pub fn drain_pending(&mut self) -> Vec<CraftEvent> {
        self.airspace.take_events()
    }

    /// Runs `f` with a context that belongs to no craft.
    pub fn with_context<R>(&mut self, f: impl FnOnce(&mut SimContext<'_>) -> R) -> R {
        self.airspace.with_context(&mut self.terrain, f)
    }

    // -------------------------------------------------------------------------
    // World setup
    // -------------------------------------------------------------------------

    /// Fills every neighbour of `tile` (including above and below) with
    /// solid blocks.
    pub fn wall_in(&mut self, tile: IVec3) {
        for x in -1..=1 {
            for y in -1..=1 {
                for z in -1..=1 {
                    let offset = IVec3::new(x, y, z);
                    if offset != IVec3::ZERO {
                        self.block(tile + offset);
                    }
                }
            }
        }
    }

    /// Places a full-height block.
    pub fn block(&mut self, tile: IVec3) {
        self.terrain.set(tile, Scenery::block(tile.z, 16));
    }

    /// Registers a portal.
    pub fn add_portal(&mut self, tile: IVec3) {
        self.airspace.add_portal(tile);
    }

    /// Puts a projectile in flight.
    pub fn add_projectile(&mut self, projectile: Projectile) {
        self.airspace.projectiles_mut().push(projectile);
    }

    // -------------------------------------------------------------------------
    // Access
    // -------------------------------------------------------------------------

    /// Tuning values.
    pub fn config(&self) -> &MoverConfig {
        self.airspace.config()
    }

    /// The airspace under test.
    pub fn airspace(&self) -> &Airspace {
        &self.airspace
    }

    /// A craft that must exist.
    pub fn craft(&self, id: CraftId) -> &Craft {
        self.airspace.get(id).expect("craft exists")
    }

    /// A craft that must exist, mutably.
    pub fn craft_mut(&mut self, id: CraftId) -> &mut Craft {
        self.airspace.get_mut(id).expect("craft exists")
    }

    /// A craft that may have been removed.
    pub fn get(&self, id: CraftId) -> Option<&Craft> {
        self.airspace.get(id)
    }

    /// The map.
    pub fn terrain(&self) -> &GridTerrain {
        &self.terrain
    }

    /// The map, mutably.
    pub fn terrain_mut(&mut self) -> &mut GridTerrain {
        &mut self.terrain
    }
}
