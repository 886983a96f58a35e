//! The simulated craft.
//!
//! A [`Craft`] aggregates physical state (position, facing, velocity, the
//! physical [`Regime`]), its mission queue and the choice of movement
//! engine. One call to [`Craft::update`] advances it by a number of ticks:
//!
//! 1. teleporter recharge
//! 2. the front mission's per-tick update
//! 3. popping finished missions (each newly exposed one starts at once)
//! 4. the mover, unless the craft is parked in a building
//!
//! A destroyed craft does nothing further in the tick it died.
//!
//! # Example
//!
//! ```
//! use glam::Vec3;
//! use skyway_core::craft::{Craft, Regime};
//! use skyway_core::entity::{CraftClass, CraftId, CraftStats};
//!
//! let craft = Craft::new(CraftId::new(1), "Hawk", CraftClass::Flying, CraftStats::default())
//!     .with_position(Vec3::new(10.5, 10.5, 5.5));
//! assert_eq!(craft.regime(), Regime::Controlled);
//! assert_eq!(craft.goal_position, craft.position);
//! assert!(craft.missions().is_empty());
//! ```

use std::collections::VecDeque;
use std::f32::consts::TAU;

use glam::{IVec3, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MoverConfig;
use crate::entity::{Altitude, BuildingId, CraftClass, CraftId, CraftStats, MoverKind};
use crate::event::CraftEvent;
use crate::mission::{Blockers, Mission};
use crate::mover::{self, MotionReport};
use crate::terrain::{tile_centre, tile_of, Terrain};
use crate::world_view::{CraftSnapshot, SimContext};

/// Physical regime of a craft. Exactly one applies at a time.
///
/// # Variants
///
/// - `Controlled`: Flying or driving under its own power
/// - `Falling`: Ballistic descent after losing control
/// - `Sliding`: Skidding along terrain after an improper landing
/// - `Crashed`: A wreck at rest
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regime {
    /// Under its own power
    #[default]
    Controlled,
    /// Ballistic descent
    Falling,
    /// Skidding along terrain
    Sliding,
    /// Wreck at rest
    Crashed,
}

/// A mobile simulated entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Craft {
    id: CraftId,
    /// Display name.
    pub name: String,
    class: CraftClass,
    /// Type statistics.
    pub stats: CraftStats,
    /// Building the craft returns to.
    pub home_building: Option<BuildingId>,
    pub(crate) current_building: Option<BuildingId>,

    /// World position in tiles.
    pub position: Vec3,
    /// Position the craft is moving to.
    pub goal_position: Vec3,
    /// Heading in radians, `[0, 2pi)`.
    pub facing: f32,
    /// Heading the craft is turning to.
    pub goal_facing: f32,
    /// Velocity in tiles per second.
    pub velocity: Vec3,
    /// Turn rate in radians per tick.
    pub angular_velocity: f32,
    /// Ticks left in the current turn.
    pub ticks_to_turn: u32,

    pub(crate) regime: Regime,
    pub(crate) carried_by: Option<CraftId>,
    pub(crate) carrying: Option<CraftId>,
    pub(crate) goal_waypoints: VecDeque<Vec3>,
    pub(crate) missions: VecDeque<Mission>,
    mover: MoverKind,
    pub(crate) ticks_auto_action_available: u64,

    /// Current health.
    pub health: i32,
    /// Current shield.
    pub shield: i32,
    /// Preferred cruise altitude.
    pub altitude: Altitude,
    pub(crate) teleport_charge: u32,
    pub(crate) destroyed: bool,
    pub(crate) departed: bool,

    /// Missions requested while the front mission was running, applied
    /// once it is back in the queue.
    #[serde(skip)]
    pub(crate) deferred: Vec<(Mission, bool)>,
}

impl Craft {
    /// Creates a controlled craft at the origin with full health.
    #[must_use]
    pub fn new(id: CraftId, name: impl Into<String>, class: CraftClass, stats: CraftStats) -> Self {
        let health = stats.max_health;
        Self {
            id,
            name: name.into(),
            class,
            stats,
            home_building: None,
            current_building: None,
            position: Vec3::ZERO,
            goal_position: Vec3::ZERO,
            facing: 0.0,
            goal_facing: 0.0,
            velocity: Vec3::ZERO,
            angular_velocity: 0.0,
            ticks_to_turn: 0,
            regime: Regime::Controlled,
            carried_by: None,
            carrying: None,
            goal_waypoints: VecDeque::new(),
            missions: VecDeque::new(),
            mover: class.mover_kind(),
            ticks_auto_action_available: 0,
            health,
            shield: 0,
            altitude: Altitude::default(),
            teleport_charge: 0,
            destroyed: false,
            departed: false,
            deferred: Vec::new(),
        }
    }

    /// Places the craft, with its goal on the same spot.
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self.goal_position = position;
        self
    }

    /// Sets the preferred cruise altitude.
    #[must_use]
    pub fn with_altitude(mut self, altitude: Altitude) -> Self {
        self.altitude = altitude;
        self
    }

    /// Sets the home building.
    #[must_use]
    pub fn with_home(mut self, building: BuildingId) -> Self {
        self.home_building = Some(building);
        self
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> CraftId {
        self.id
    }

    /// Locomotion class.
    #[must_use]
    pub const fn class(&self) -> CraftClass {
        self.class
    }

    /// Movement engine for the controlled regime.
    #[must_use]
    pub const fn mover_kind(&self) -> MoverKind {
        self.mover
    }

    /// Physical regime.
    #[must_use]
    pub const fn regime(&self) -> Regime {
        self.regime
    }

    /// Building the craft is parked in.
    #[must_use]
    pub const fn current_building(&self) -> Option<BuildingId> {
        self.current_building
    }

    /// Craft carrying this one.
    #[must_use]
    pub const fn carried_by(&self) -> Option<CraftId> {
        self.carried_by
    }

    /// Craft this one carries.
    #[must_use]
    pub const fn carrying(&self) -> Option<CraftId> {
        self.carrying
    }

    /// Queued missions, front first.
    #[must_use]
    pub const fn missions(&self) -> &VecDeque<Mission> {
        &self.missions
    }

    /// The mission currently in charge.
    #[must_use]
    pub fn front_mission(&self) -> Option<&Mission> {
        self.missions.front()
    }

    /// Intermediate goals queued before the next mission goal.
    #[must_use]
    pub const fn goal_waypoints(&self) -> &VecDeque<Vec3> {
        &self.goal_waypoints
    }

    /// Whether the craft was destroyed.
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether the craft left the map through a portal.
    #[must_use]
    pub const fn has_departed(&self) -> bool {
        self.departed
    }

    /// Whether the craft still takes part in the simulation.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.destroyed && !self.departed
    }

    /// Tile the craft is in.
    #[must_use]
    pub fn tile(&self) -> IVec3 {
        tile_of(self.position)
    }

    /// Top speed in tiles per second.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.stats.top_speed
    }

    /// Conditions that currently refuse missions.
    #[must_use]
    pub fn blockers(&self) -> Blockers {
        let mut blockers = match self.regime {
            Regime::Controlled => Blockers::empty(),
            Regime::Falling => Blockers::FALLING,
            Regime::Sliding => Blockers::SLIDING,
            Regime::Crashed => Blockers::CRASHED,
        };
        if self.carried_by.is_some() {
            blockers |= Blockers::CARRIED;
        }
        blockers
    }

    /// Whether a charged teleporter is available.
    #[must_use]
    pub fn can_teleport(&self, config: &MoverConfig) -> bool {
        self.stats.teleporter
            && !self.class.is_ground()
            && self.teleport_charge >= config.missions.teleport_recharge_ticks
    }

    /// What other craft may see of this one.
    #[must_use]
    pub fn snapshot(&self) -> CraftSnapshot {
        CraftSnapshot {
            position: self.position,
            facing: self.facing,
            regime: self.regime,
            class: self.class,
            current_building: self.current_building,
            carried_by: self.carried_by,
            alive: self.is_alive(),
        }
    }

    /// Whether the craft sits on (or in) the scenery of its tile.
    pub(crate) fn rests_on_ground(&self, terrain: &dyn Terrain) -> bool {
        terrain
            .scenery(self.tile())
            .is_some_and(|s| self.position.z <= s.resting_z + 0.01)
    }

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------

    /// Advances the craft by `ticks`.
    pub fn update(&mut self, ticks: u32, ctx: &mut SimContext<'_>) -> MotionReport {
        if !self.is_alive() {
            return MotionReport::default();
        }
        self.charge_teleporter(ticks, ctx.config);

        self.with_front(ctx, |mission, craft, ctx| mission.update(craft, ctx, ticks));
        if !self.is_alive() {
            return MotionReport::default();
        }
        self.pop_finished_missions(ctx);
        if !self.is_alive() || self.current_building.is_some() {
            return MotionReport::default();
        }
        mover::mover_for(self.mover).update(self, ticks, ctx)
    }

    fn charge_teleporter(&mut self, ticks: u32, config: &MoverConfig) {
        if self.stats.teleporter && !self.class.is_ground() {
            self.teleport_charge = self
                .teleport_charge
                .saturating_add(ticks)
                .min(config.missions.teleport_recharge_ticks);
        } else {
            self.teleport_charge = 0;
        }
    }

    /// Queues a mission to be placed once the front mission is back in the
    /// queue. Missions must not touch the queue directly while running.
    pub(crate) fn defer_mission(&mut self, mission: Mission, to_back: bool) {
        self.deferred.push((mission, to_back));
    }

    // -------------------------------------------------------------------------
    // Damage and downing
    // -------------------------------------------------------------------------

    /// Applies a hit. Returns `true` if it destroyed the craft.
    ///
    /// The shield soaks damage first and is spent entirely when the hit is at
    /// least as strong. Armour then reduces what is left. Dropping to or
    /// below the crash threshold downs the craft: UFOs crash in place, other
    /// classes start falling.
    pub fn apply_damage(
        &mut self,
        damage: i32,
        armour: i32,
        attacker: Option<CraftId>,
        ctx: &mut SimContext<'_>,
    ) -> bool {
        if !self.is_alive() {
            return false;
        }
        let mut damage = damage;
        if self.shield > damage {
            self.shield -= damage;
            return false;
        }
        damage -= self.shield.max(0);
        self.shield = 0;

        damage -= armour;
        if damage <= 0 {
            return false;
        }
        let was_downed = self.health <= self.stats.crash_health;
        self.health -= damage;
        if self.health <= 0 {
            self.die(attacker, false, ctx);
            return true;
        }
        if !was_downed && self.health <= self.stats.crash_health && self.regime != Regime::Crashed
        {
            if self.class == CraftClass::Ufo {
                self.crash(attacker, ctx);
            } else if self.regime != Regime::Falling {
                self.start_falling(attacker, ctx);
            }
        }
        false
    }

    /// Turns the craft into a wreck.
    pub fn crash(&mut self, attacker: Option<CraftId>, ctx: &mut SimContext<'_>) {
        self.drop_carried(ctx);
        self.regime = Regime::Crashed;
        self.health = self.health.min(self.stats.wreck_health());
        info!(craft = %self.id, ?attacker, "crashed");
        ctx.emit(CraftEvent::SmokeStarted { craft: self.id });
        ctx.emit(CraftEvent::CrashLanded {
            craft: self.id,
            position: self.position,
        });

        let placed = if self.class == CraftClass::Ufo {
            self.set_mission(Mission::crash_land(), ctx).and_then(|()| {
                self.add_mission(Mission::self_destruct(ctx.config), true, ctx)
            })
        } else {
            self.set_mission(Mission::self_destruct(ctx.config), ctx)
        };
        if let Err(err) = placed {
            debug!(craft = %self.id, %err, "wreck missions not placed");
        }
    }

    /// Puts the craft into free fall.
    pub fn start_falling(&mut self, attacker: Option<CraftId>, ctx: &mut SimContext<'_>) {
        self.drop_carried(ctx);
        self.regime = Regime::Falling;
        if self.angular_velocity == 0.0 {
            let rate = self.speed() * ctx.config.turning.rate_per_speed;
            self.angular_velocity = match ctx.rng.gen_range(-1..=1) {
                -1 => -rate,
                1 => rate,
                _ => 0.0,
            };
        }
        debug!(craft = %self.id, ?attacker, "started falling");
    }

    /// Destroys the craft. `silent` suppresses the explosion cue.
    pub fn die(&mut self, attacker: Option<CraftId>, silent: bool, ctx: &mut SimContext<'_>) {
        if self.destroyed {
            return;
        }
        self.health = self.health.min(0);
        self.destroyed = true;
        info!(craft = %self.id, ?attacker, silent, "destroyed");
        ctx.emit(CraftEvent::Destroyed {
            craft: self.id,
            attacker,
            silent,
        });
    }

    /// Lets go of the carried craft, if any.
    pub(crate) fn drop_carried(&mut self, ctx: &mut SimContext<'_>) {
        if let Some(carried) = self.carrying.take() {
            debug!(craft = %self.id, %carried, "released carried craft");
            ctx.emit(CraftEvent::Released {
                carrier: self.id,
                carried,
            });
        }
    }

    // -------------------------------------------------------------------------
    // Buildings
    // -------------------------------------------------------------------------

    /// Docks with `building`, stowing any carried craft.
    pub fn enter_building(&mut self, building: BuildingId, ctx: &mut SimContext<'_>) {
        self.carried_by = None;
        if self.regime == Regime::Crashed {
            self.regime = Regime::Controlled;
        }
        if let Some(current) = self.current_building {
            warn!(craft = %self.id, %current, %building, "already inside a building");
            return;
        }
        if let Some(carried) = self.carrying.take() {
            ctx.emit(CraftEvent::Stowed {
                carrier: self.id,
                carried,
                building,
            });
        }
        if let Some(tile) = ctx.view.building(building).and_then(|b| b.exit_tile(self.class)) {
            self.position = tile.as_vec3() + Vec3::splat(0.5);
        }
        self.current_building = Some(building);
        self.goal_position = self.position;
        self.goal_waypoints.clear();
        self.velocity = Vec3::ZERO;
        self.facing = 0.0;
        self.goal_facing = 0.0;
        self.angular_velocity = 0.0;
        self.ticks_to_turn = 0;
        info!(craft = %self.id, %building, "entered building");
        ctx.emit(CraftEvent::EnteredBuilding {
            craft: self.id,
            building,
        });
    }

    /// Launches from the current building onto its pad or car entrance.
    /// Returns `false` if the craft was not inside a building.
    ///
    /// A building without a suitable exit releases the craft where it is.
    pub fn leave_building(&mut self, ctx: &mut SimContext<'_>) -> bool {
        let Some(building) = self.current_building.take() else {
            return false;
        };
        match ctx.view.building(building).and_then(|b| b.exit_tile(self.class)) {
            Some(tile) => {
                #[allow(clippy::cast_precision_loss)]
                let base = tile.z as f32;
                let z = if self.class.is_ground() {
                    ctx.terrain.scenery(tile).map_or(base, |s| s.resting_z)
                } else {
                    base + 0.5
                };
                self.position = tile_centre(tile, z);
            }
            None => warn!(craft = %self.id, %building, "building has no exit for this craft"),
        }
        self.goal_position = self.position;
        self.goal_waypoints.clear();
        self.velocity = Vec3::ZERO;
        self.facing = 0.0;
        self.goal_facing = 0.0;
        self.angular_velocity = 0.0;
        self.ticks_to_turn = 0;
        info!(craft = %self.id, %building, "left building");
        ctx.emit(CraftEvent::LeftBuilding {
            craft: self.id,
            building,
        });
        true
    }
}

/// Wraps an angle into `[0, 2pi)`.
#[must_use]
pub(crate) fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}

/// Heading that points along `direction` in the XY plane, measured from
/// north (`-y`) towards east (`+x`). `None` for a vertical direction.
#[must_use]
pub(crate) fn facing_towards(direction: Vec3) -> Option<f32> {
    let flat = direction.truncate().try_normalize()?;
    let from_north = (-flat.y).clamp(-1.0, 1.0).acos();
    let eastward = flat.x.clamp(-1.0, 1.0).asin();
    Some(if eastward >= 0.0 {
        from_north
    } else {
        wrap_angle(TAU - from_north)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::Harness;

    mod damage_tests {
        use super::*;

        #[test]
        fn shield_soaks_smaller_hits() {
            let mut h = Harness::open_sky();
            let id = h.spawn_flyer(glam::Vec3::new(4.5, 4.5, 5.5));
            h.craft_mut(id).shield = 20;
            assert!(!h.damage(id, 15, 0));
            let craft = h.craft(id);
            assert_eq!(craft.shield, 5);
            assert_eq!(craft.health, 100);
        }

        #[test]
        fn equal_hit_spends_shield_without_harm() {
            let mut h = Harness::open_sky();
            let id = h.spawn_flyer(glam::Vec3::new(4.5, 4.5, 5.5));
            h.craft_mut(id).shield = 20;
            assert!(!h.damage(id, 20, 0));
            assert_eq!(h.craft(id).shield, 0);
            assert_eq!(h.craft(id).health, 100);
        }

        #[test]
        fn armour_reduces_remaining_damage() {
            let mut h = Harness::open_sky();
            let id = h.spawn_flyer(glam::Vec3::new(4.5, 4.5, 5.5));
            assert!(!h.damage(id, 30, 10));
            assert_eq!(h.craft(id).health, 80);
        }

        #[test]
        fn crossing_crash_threshold_downs_flyer() {
            let mut h = Harness::open_sky();
            let id = h.spawn_flyer(glam::Vec3::new(4.5, 4.5, 5.5));
            h.craft_mut(id).stats.crash_health = 50;
            assert!(!h.damage(id, 60, 0));
            assert_eq!(h.craft(id).regime(), Regime::Falling);
        }

        #[test]
        fn crossing_crash_threshold_wrecks_ufo() {
            let mut h = Harness::open_sky();
            let id = h.spawn(CraftClass::Ufo, glam::Vec3::new(4.5, 4.5, 5.5));
            h.craft_mut(id).stats.crash_health = 50;
            h.damage(id, 60, 0);
            let craft = h.craft(id);
            // In mid-air the crash mission immediately drops the wreck.
            assert_eq!(craft.regime(), Regime::Falling);
            let kinds: Vec<_> = craft.missions().iter().map(Mission::mission_type).collect();
            assert_eq!(
                kinds,
                vec![
                    crate::mission::MissionType::Crash,
                    crate::mission::MissionType::SelfDestruct
                ]
            );
        }

        #[test]
        fn lethal_hit_keeps_negative_health() {
            let mut h = Harness::open_sky();
            let id = h.spawn_flyer(glam::Vec3::new(4.5, 4.5, 5.5));
            assert!(h.damage(id, 110, 0));
            let craft = h.craft(id);
            assert_eq!(craft.health, -10);
            assert!(craft.is_destroyed());
        }
    }

    mod heading_tests {
        use super::*;
        use std::f32::consts::{FRAC_PI_2, PI};

        #[test]
        fn compass_headings() {
            let north = facing_towards(Vec3::new(0.0, -1.0, 0.0)).unwrap();
            let east = facing_towards(Vec3::new(1.0, 0.0, 0.0)).unwrap();
            let south = facing_towards(Vec3::new(0.0, 1.0, 0.0)).unwrap();
            let west = facing_towards(Vec3::new(-1.0, 0.0, 0.0)).unwrap();
            assert!(north.abs() < 1e-6);
            assert!((east - FRAC_PI_2).abs() < 1e-6);
            assert!((south - PI).abs() < 1e-6);
            assert!((west - 3.0 * FRAC_PI_2).abs() < 1e-5);
        }

        #[test]
        fn vertical_has_no_heading() {
            assert!(facing_towards(Vec3::Z).is_none());
        }

        #[test]
        fn wrap_stays_in_range() {
            assert!((wrap_angle(-0.5) - (TAU - 0.5)).abs() < 1e-6);
            assert!((wrap_angle(TAU + 1.0) - 1.0).abs() < 1e-5);
            assert!(wrap_angle(-1e-9) < TAU);
        }
    }
}
