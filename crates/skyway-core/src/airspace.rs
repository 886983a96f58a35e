//! The airspace: registry and batch driver for every craft on the map.
//!
//! The Airspace provides:
//! - Craft storage with deterministic iteration order (`BTreeMap`)
//! - The single seeded random stream all craft draw from
//! - Buildings, portals and the projectile list the dodge heuristic reads
//! - Batch updates in ascending [`CraftId`] order
//! - Bookkeeping of cross-craft relations (carry links, mission targets,
//!   projectile tracking) once a batch is over
//!
//! # Batches
//!
//! At the start of [`Airspace::update`] every craft is snapshotted. Each
//! craft then advances against that snapshot, so it sees the others as they
//! were when the batch began, whatever order they update in. Cross-craft
//! effects raised during the batch are applied afterwards, then dead and
//! departed craft are removed.
//!
//! # Example
//!
//! ```
//! use glam::{IVec3, Vec3};
//! use skyway_core::airspace::Airspace;
//! use skyway_core::config::MoverConfig;
//! use skyway_core::entity::{CraftClass, CraftStats};
//! use skyway_core::mission::Mission;
//! use skyway_core::terrain::{GridTerrain, Scenery};
//!
//! let mut terrain = GridTerrain::new(IVec3::new(16, 16, 8));
//! terrain.fill_layer(0, Scenery::ground);
//!
//! let mut airspace = Airspace::new(MoverConfig::default(), 7);
//! let hawk = airspace.spawn("Hawk", CraftClass::Flying, CraftStats::default(), Vec3::new(2.5, 2.5, 5.5));
//! let goto = Mission::goto_location(IVec3::new(6, 2, 5), airspace.config());
//! airspace.add_mission(&mut terrain, hawk, goto, true).unwrap();
//!
//! for _ in 0..400 {
//!     airspace.update(&mut terrain, 1);
//! }
//! assert_eq!(airspace.get(hawk).unwrap().tile(), IVec3::new(6, 2, 5));
//! ```

use std::collections::BTreeMap;

use glam::{IVec3, Vec3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::MoverConfig;
use crate::craft::{Craft, Regime};
use crate::entity::{BuildingId, CraftClass, CraftId, CraftStats};
use crate::error::PlacementError;
use crate::event::CraftEvent;
use crate::mission::Mission;
use crate::mover::MotionReport;
use crate::terrain::Terrain;
use crate::world_view::{Building, CraftSnapshot, Landmarks, Projectile, SimContext, WorldView};

/// Registry of every craft on the map.
#[derive(Debug, Clone)]
pub struct Airspace {
    config: MoverConfig,
    /// Next craft ID to assign. Monotonically increasing.
    next_id: u64,
    /// Craft storage with deterministic iteration order.
    crafts: BTreeMap<CraftId, Craft>,
    projectiles: Vec<Projectile>,
    landmarks: Landmarks,
    seed: u64,
    rng: ChaCha8Rng,
    /// Current simulation time in ticks.
    now: u64,
    /// Settled events not yet handed out.
    pending: Vec<CraftEvent>,
}

impl Airspace {
    /// Creates an empty airspace at tick 0.
    ///
    /// The same `seed` and the same sequence of calls reproduce the same
    /// simulation exactly.
    #[must_use]
    pub fn new(config: MoverConfig, seed: u64) -> Self {
        Self {
            config,
            next_id: 1,
            crafts: BTreeMap::new(),
            projectiles: Vec::new(),
            landmarks: Landmarks::default(),
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            now: 0,
            pending: Vec::new(),
        }
    }

    /// Tuning values.
    #[must_use]
    pub const fn config(&self) -> &MoverConfig {
        &self.config
    }

    /// Seed of the random stream.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Current simulation time in ticks.
    #[must_use]
    pub const fn now(&self) -> u64 {
        self.now
    }

    // -------------------------------------------------------------------------
    // Craft registry
    // -------------------------------------------------------------------------

    /// Adds a controlled craft at `position` and returns its ID.
    pub fn spawn(
        &mut self,
        name: impl Into<String>,
        class: CraftClass,
        stats: CraftStats,
        position: Vec3,
    ) -> CraftId {
        let id = CraftId::new(self.next_id);
        self.next_id += 1;
        let craft = Craft::new(id, name, class, stats).with_position(position);
        debug!(craft = %id, %class, ?position, "spawned");
        self.crafts.insert(id, craft);
        id
    }

    /// Adds a craft parked inside `building`. Returns `None` if the
    /// building is unknown.
    pub fn spawn_in_building(
        &mut self,
        name: impl Into<String>,
        class: CraftClass,
        stats: CraftStats,
        building: BuildingId,
    ) -> Option<CraftId> {
        let exit = self.landmarks.buildings.get(&building)?.exit_tile(class);
        let position = exit.map_or(Vec3::ZERO, |tile| tile.as_vec3() + Vec3::splat(0.5));
        let id = self.spawn(name, class, stats, position);
        if let Some(craft) = self.crafts.get_mut(&id) {
            craft.current_building = Some(building);
            craft.home_building.get_or_insert(building);
        }
        Some(id)
    }

    /// Removes a craft without any of the death bookkeeping.
    pub fn despawn(&mut self, id: CraftId) -> Option<Craft> {
        self.crafts.remove(&id)
    }

    /// A craft by ID.
    #[must_use]
    pub fn get(&self, id: CraftId) -> Option<&Craft> {
        self.crafts.get(&id)
    }

    /// A craft by ID, mutably.
    #[must_use]
    pub fn get_mut(&mut self, id: CraftId) -> Option<&mut Craft> {
        self.crafts.get_mut(&id)
    }

    /// All craft in ID order.
    pub fn crafts(&self) -> impl Iterator<Item = &Craft> + '_ {
        self.crafts.values()
    }

    /// Number of craft.
    #[must_use]
    pub fn len(&self) -> usize {
        self.crafts.len()
    }

    /// Returns `true` if there are no craft.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.crafts.is_empty()
    }

    // -------------------------------------------------------------------------
    // Map features
    // -------------------------------------------------------------------------

    /// Registers (or replaces) a building.
    pub fn add_building(&mut self, building: Building) {
        self.landmarks.buildings.insert(building.id, building);
    }

    /// Registers a portal tile.
    pub fn add_portal(&mut self, tile: IVec3) {
        if !self.landmarks.portals.contains(&tile) {
            self.landmarks.portals.push(tile);
        }
    }

    /// Buildings and portals.
    #[must_use]
    pub const fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// In-flight projectiles.
    #[must_use]
    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    /// In-flight projectiles, for the outer layer that moves them.
    pub fn projectiles_mut(&mut self) -> &mut Vec<Projectile> {
        &mut self.projectiles
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Places a mission on a craft.
    ///
    /// # Errors
    ///
    /// [`PlacementError::UnknownCraft`] for an unknown ID, otherwise
    /// whatever [`Craft::add_mission`] refuses.
    pub fn add_mission(
        &mut self,
        terrain: &mut dyn Terrain,
        id: CraftId,
        mission: Mission,
        to_back: bool,
    ) -> Result<(), PlacementError> {
        self.with_craft(terrain, id, |craft, ctx| craft.add_mission(mission, to_back, ctx))
            .unwrap_or(Err(PlacementError::UnknownCraft(id)))
    }

    /// Replaces a craft's missions.
    ///
    /// # Errors
    ///
    /// [`PlacementError::UnknownCraft`] for an unknown ID, otherwise
    /// whatever [`Craft::set_mission`] refuses.
    pub fn set_mission(
        &mut self,
        terrain: &mut dyn Terrain,
        id: CraftId,
        mission: Mission,
    ) -> Result<(), PlacementError> {
        self.with_craft(terrain, id, |craft, ctx| craft.set_mission(mission, ctx))
            .unwrap_or(Err(PlacementError::UnknownCraft(id)))
    }

    /// Hits a craft. Returns whether the hit destroyed it, or `None` for an
    /// unknown ID.
    ///
    /// A craft destroyed here stays in the registry, marked destroyed, until
    /// the next [`update`](Self::update).
    pub fn apply_damage(
        &mut self,
        terrain: &mut dyn Terrain,
        id: CraftId,
        damage: i32,
        armour: i32,
        attacker: Option<CraftId>,
    ) -> Option<bool> {
        self.with_craft(terrain, id, |craft, ctx| {
            craft.apply_damage(damage, armour, attacker, ctx)
        })
    }

    /// Advances a single craft without advancing the clock.
    pub fn update_craft(
        &mut self,
        terrain: &mut dyn Terrain,
        id: CraftId,
        ticks: u32,
    ) -> Option<MotionReport> {
        self.with_craft(terrain, id, |craft, ctx| craft.update(ticks, ctx))
    }

    /// Advances every craft by `ticks`, in ID order, then applies the
    /// cross-craft effects of the batch and removes dead craft.
    ///
    /// Returns every event settled since the last call to
    /// [`take_events`](Self::take_events), including ones raised by direct
    /// commands.
    pub fn update(&mut self, terrain: &mut dyn Terrain, ticks: u32) -> Vec<CraftEvent> {
        let snapshots = self.snapshots();
        let mut events = Vec::new();
        {
            let view = WorldView::new(&snapshots, &self.projectiles, &self.landmarks, self.now);
            let mut ctx = SimContext {
                terrain: &mut *terrain,
                view,
                config: &self.config,
                rng: &mut self.rng,
                events: &mut events,
            };
            for craft in self.crafts.values_mut() {
                craft.update(ticks, &mut ctx);
            }
        }
        self.settle(terrain, events);
        self.reap();
        self.now += u64::from(ticks);
        self.take_events()
    }

    /// Hands out the settled events.
    pub fn take_events(&mut self) -> Vec<CraftEvent> {
        std::mem::take(&mut self.pending)
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn snapshots(&self) -> BTreeMap<CraftId, CraftSnapshot> {
        self.crafts
            .iter()
            .map(|(id, craft)| (*id, craft.snapshot()))
            .collect()
    }

    /// Runs `f` on one craft with a fresh context, then settles what it
    /// raised.
    fn with_craft<R>(
        &mut self,
        terrain: &mut dyn Terrain,
        id: CraftId,
        f: impl FnOnce(&mut Craft, &mut SimContext<'_>) -> R,
    ) -> Option<R> {
        let snapshots = self.snapshots();
        let mut events = Vec::new();
        let result = {
            let craft = self.crafts.get_mut(&id)?;
            let view = WorldView::new(&snapshots, &self.projectiles, &self.landmarks, self.now);
            let mut ctx = SimContext {
                terrain: &mut *terrain,
                view,
                config: &self.config,
                rng: &mut self.rng,
                events: &mut events,
            };
            f(craft, &mut ctx)
        };
        self.settle(terrain, events);
        Some(result)
    }

    /// Applies the cross-craft side of `events` and of anything that raises
    /// in turn.
    fn settle(&mut self, terrain: &mut dyn Terrain, mut events: Vec<CraftEvent>) {
        while !events.is_empty() {
            let batch = std::mem::take(&mut events);
            let snapshots = self.snapshots();
            {
                let view = WorldView::new(&snapshots, &self.projectiles, &self.landmarks, self.now);
                let mut ctx = SimContext {
                    terrain: &mut *terrain,
                    view,
                    config: &self.config,
                    rng: &mut self.rng,
                    events: &mut events,
                };
                for event in &batch {
                    apply_relation(&mut self.crafts, event, &mut ctx);
                }
            }
            for event in &batch {
                if let CraftEvent::Destroyed { craft, .. }
                | CraftEvent::DepartedThroughPortal { craft, .. } = event
                {
                    untrack(&mut self.projectiles, *craft);
                }
            }
            self.pending.extend(batch);
        }
    }

    /// Drops destroyed and departed craft.
    fn reap(&mut self) {
        self.crafts.retain(|id, craft| {
            if !craft.is_alive() {
                debug!(craft = %id, "removed from airspace");
            }
            craft.is_alive()
        });
    }

    /// Runs `f` with a context that belongs to no craft.
    #[cfg(test)]
    pub(crate) fn with_context<R>(
        &mut self,
        terrain: &mut dyn Terrain,
        f: impl FnOnce(&mut SimContext<'_>) -> R,
    ) -> R {
        let snapshots = self.snapshots();
        let mut events = Vec::new();
        let result = {
            let view = WorldView::new(&snapshots, &self.projectiles, &self.landmarks, self.now);
            let mut ctx = SimContext {
                terrain: &mut *terrain,
                view,
                config: &self.config,
                rng: &mut self.rng,
                events: &mut events,
            };
            f(&mut ctx)
        };
        self.settle(terrain, events);
        result
    }
}

/// Applies the effect one craft's event has on others.
fn apply_relation(
    crafts: &mut BTreeMap<CraftId, Craft>,
    event: &CraftEvent,
    ctx: &mut SimContext<'_>,
) {
    match *event {
        CraftEvent::Attached { carrier, carried } => {
            if let Some(load) = crafts.get_mut(&carried) {
                load.carried_by = Some(carrier);
                load.clear_missions(true);
                load.goal_waypoints.clear();
                load.velocity = Vec3::ZERO;
                load.angular_velocity = 0.0;
            }
        }
        CraftEvent::Released { carrier, carried } => {
            if let Some(load) = crafts.get_mut(&carried) {
                if load.carried_by == Some(carrier) {
                    load.carried_by = None;
                    if load.regime == Regime::Crashed {
                        load.regime = Regime::Controlled;
                    }
                    load.start_falling(None, ctx);
                }
            }
        }
        CraftEvent::Stowed {
            carried, building, ..
        } => {
            if let Some(load) = crafts.get_mut(&carried) {
                load.enter_building(building, ctx);
            }
        }
        CraftEvent::Destroyed { craft, .. } | CraftEvent::DepartedThroughPortal { craft, .. } => {
            forget_craft(crafts, craft, ctx);
        }
        _ => {}
    }
}

/// Clears every reference other craft hold to `gone`. Craft it carried
/// drop.
fn forget_craft(crafts: &mut BTreeMap<CraftId, Craft>, gone: CraftId, ctx: &mut SimContext<'_>) {
    for (id, craft) in crafts.iter_mut() {
        if *id == gone {
            continue;
        }
        for mission in &mut craft.missions {
            mission.forget_craft(gone);
        }
        if craft.carrying == Some(gone) {
            craft.carrying = None;
        }
        if craft.carried_by == Some(gone) && craft.is_alive() {
            debug!(craft = %id, carrier = %gone, "carrier gone, dropping");
            craft.carried_by = None;
            if craft.regime == Regime::Crashed {
                craft.regime = Regime::Controlled;
            }
            craft.start_falling(None, ctx);
        }
    }
}

fn untrack(projectiles: &mut [Projectile], gone: CraftId) {
    for projectile in projectiles.iter_mut().filter(|p| p.tracked == Some(gone)) {
        projectile.tracked = None;
        projectile.turn_rate = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{GridTerrain, Scenery};

    fn terrain() -> GridTerrain {
        let mut terrain = GridTerrain::new(IVec3::new(12, 12, 8));
        terrain.fill_layer(0, Scenery::ground);
        terrain
    }

    fn flyer(airspace: &mut Airspace, position: Vec3) -> CraftId {
        airspace.spawn("Hawk", CraftClass::Flying, CraftStats::default(), position)
    }

    mod registry_tests {
        use super::*;

        #[test]
        fn spawn_assigns_sequential_ids() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let a = flyer(&mut airspace, Vec3::new(1.5, 1.5, 5.5));
            let b = flyer(&mut airspace, Vec3::new(2.5, 1.5, 5.5));
            assert_eq!(a, CraftId::new(1));
            assert_eq!(b, CraftId::new(2));
            assert_eq!(airspace.len(), 2);
        }

        #[test]
        fn crafts_iterate_in_id_order() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            for x in 0..5 {
                flyer(&mut airspace, Vec3::new(x as f32 + 0.5, 1.5, 5.5));
            }
            airspace.despawn(CraftId::new(3));
            let ids: Vec<u64> = airspace.crafts().map(|c| c.id().as_u64()).collect();
            assert_eq!(ids, vec![1, 2, 4, 5]);
        }

        #[test]
        fn spawn_in_unknown_building_fails() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let spawned = airspace.spawn_in_building(
                "Hawk",
                CraftClass::Flying,
                CraftStats::default(),
                BuildingId::new(4),
            );
            assert!(spawned.is_none());
            assert!(airspace.is_empty());
        }

        #[test]
        fn spawn_in_building_parks_and_sets_home() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            airspace.add_building(Building {
                id: BuildingId::new(4),
                landing_pads: vec![IVec3::new(3, 3, 2)],
                car_entrances: vec![],
            });
            let id = airspace
                .spawn_in_building("Hawk", CraftClass::Flying, CraftStats::default(), BuildingId::new(4))
                .unwrap();
            let craft = airspace.get(id).unwrap();
            assert_eq!(craft.current_building(), Some(BuildingId::new(4)));
            assert_eq!(craft.home_building, Some(BuildingId::new(4)));
            assert_eq!(craft.tile(), IVec3::new(3, 3, 2));
        }

        #[test]
        fn portals_are_unique() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            airspace.add_portal(IVec3::new(1, 1, 5));
            airspace.add_portal(IVec3::new(1, 1, 5));
            assert_eq!(airspace.landmarks().portals.len(), 1);
        }
    }

    mod command_tests {
        use super::*;

        #[test]
        fn unknown_craft_is_reported() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let mut terrain = terrain();
            let err = airspace
                .add_mission(&mut terrain, CraftId::new(9), Mission::snooze(5), true)
                .unwrap_err();
            assert_eq!(err, PlacementError::UnknownCraft(CraftId::new(9)));
            assert!(airspace
                .apply_damage(&mut terrain, CraftId::new(9), 10, 0, None)
                .is_none());
        }

        #[test]
        fn update_advances_clock() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let mut terrain = terrain();
            airspace.update(&mut terrain, 5);
            airspace.update(&mut terrain, 7);
            assert_eq!(airspace.now(), 12);
        }

        #[test]
        fn update_craft_leaves_clock_alone() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let mut terrain = terrain();
            let id = flyer(&mut airspace, Vec3::new(1.5, 1.5, 5.5));
            assert!(airspace.update_craft(&mut terrain, id, 3).is_some());
            assert_eq!(airspace.now(), 0);
        }
    }

    mod relation_tests {
        use super::*;

        #[test]
        fn death_clears_tracking_and_targets() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let mut terrain = terrain();
            let prey = flyer(&mut airspace, Vec3::new(8.5, 8.5, 5.5));
            let hunter = flyer(&mut airspace, Vec3::new(1.5, 1.5, 5.5));
            airspace
                .add_mission(&mut terrain, hunter, Mission::attack_vehicle(prey), true)
                .unwrap();
            let mut missile = Projectile::new(Vec3::new(1.5, 1.5, 5.5), Vec3::X, 100);
            missile.tracked = Some(prey);
            missile.turn_rate = 0.3;
            airspace.projectiles_mut().push(missile);

            assert_eq!(airspace.apply_damage(&mut terrain, prey, 1000, 0, Some(hunter)), Some(true));
            assert!(airspace.get(prey).is_some_and(Craft::is_destroyed));
            let missile = &airspace.projectiles()[0];
            assert_eq!(missile.tracked, None);
            assert_eq!(missile.turn_rate, 0.0);
            assert_eq!(
                airspace
                    .get(hunter)
                    .and_then(Craft::front_mission)
                    .and_then(|m| m.kind().target_craft()),
                None
            );
            let events = airspace.take_events();
            assert!(events.contains(&CraftEvent::Destroyed {
                craft: prey,
                attacker: Some(hunter),
                silent: false,
            }));
        }

        #[test]
        fn destroyed_craft_leave_on_next_update() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let mut terrain = terrain();
            let id = flyer(&mut airspace, Vec3::new(4.5, 4.5, 5.5));
            airspace.apply_damage(&mut terrain, id, 1000, 0, None);
            assert_eq!(airspace.len(), 1);
            let events = airspace.update(&mut terrain, 1);
            assert!(airspace.is_empty());
            assert_eq!(events.len(), 1);
        }

        #[test]
        fn carrier_death_drops_load() {
            let mut airspace = Airspace::new(MoverConfig::default(), 1);
            let mut terrain = terrain();
            let carrier = flyer(&mut airspace, Vec3::new(4.5, 4.5, 5.5));
            let load = flyer(&mut airspace, Vec3::new(4.5, 4.5, 5.0));
            airspace.get_mut(carrier).unwrap().carrying = Some(load);
            airspace.get_mut(load).unwrap().carried_by = Some(carrier);

            airspace.apply_damage(&mut terrain, carrier, 1000, 0, None);
            let load = airspace.get(load).unwrap();
            assert_eq!(load.carried_by(), None);
            assert_eq!(load.regime(), Regime::Falling);
        }
    }
}
