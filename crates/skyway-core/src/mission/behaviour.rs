//! Per-kind mission lifecycle: start, per-tick update, finish check and
//! goal production.

use glam::IVec3;
use rand::Rng;
use tracing::{debug, warn};

use crate::craft::{Craft, Regime};
use crate::entity::{BuildingId, CraftClass};
use crate::event::CraftEvent;
use crate::mission::path::{self, destination};
use crate::mission::{Goal, Mission, MissionKind};
use crate::terrain::{tile_of, EnterQuery, Terrain};
use crate::world_view::{Building, SimContext};

/// Random tiles tried before a teleport jump or patrol leg gives up.
const PLACEMENT_TRIES: usize = 30;

/// Radius of the circle flown around an attacked building.
const ATTACK_RADIUS: i32 = 3;

impl Mission {
    // =========================================================================
    // Start
    // =========================================================================

    /// Runs when the mission becomes the queue front.
    pub(crate) fn start(&mut self, craft: &mut Craft, ctx: &mut SimContext<'_>) {
        let iterations = ctx.config.missions.path_iterations;
        match self.kind {
            MissionKind::GotoLocation {
                target,
                allow_teleporter,
                pick_nearest,
                ..
            } => {
                if request_take_off(craft) {
                    return;
                }
                if allow_teleporter && craft.can_teleport(ctx.config) {
                    craft.defer_mission(Mission::teleport(Some(target)), false);
                    return;
                }
                if self.planned_path.is_empty() {
                    self.plan_location(craft, ctx, target, pick_nearest);
                }
            }
            MissionKind::GotoBuilding {
                target,
                allow_teleporter,
                ..
            } => {
                let Some(target) = target.or(craft.home_building) else {
                    warn!(craft = %craft.id(), "no building to go to");
                    self.cancel();
                    return;
                };
                if let MissionKind::GotoBuilding { target: slot, .. } = &mut self.kind {
                    *slot = Some(target);
                }
                if craft.current_building == Some(target) || request_take_off(craft) {
                    return;
                }
                let Some(approach) = ctx
                    .view
                    .building(target)
                    .and_then(|b| approach_tile(b, craft.class()))
                else {
                    warn!(craft = %craft.id(), building = %target, "building cannot be reached");
                    self.cancel();
                    return;
                };
                if allow_teleporter && craft.can_teleport(ctx.config) {
                    craft.defer_mission(Mission::teleport(Some(approach)), false);
                    return;
                }
                self.set_path_to(craft, &*ctx.terrain, iterations, approach, false);
            }
            MissionKind::FollowVehicle { target } | MissionKind::AttackVehicle { target, .. } => {
                if request_take_off(craft) {
                    return;
                }
                if let Some(other) = target.and_then(|t| ctx.view.craft(t)) {
                    let tile = tile_of(other.position);
                    self.set_path_to(craft, &*ctx.terrain, iterations, tile, true);
                }
            }
            MissionKind::RecoverVehicle { target, attached } => {
                if attached || request_take_off(craft) {
                    return;
                }
                if let Some(other) = target.and_then(|t| ctx.view.craft(t)) {
                    let above = tile_of(other.position) + IVec3::Z;
                    self.set_path_to(craft, &*ctx.terrain, iterations, above, true);
                }
            }
            MissionKind::AttackBuilding { .. } | MissionKind::Patrol { .. } => {
                request_take_off(craft);
            }
            MissionKind::GotoPortal { target, .. } => {
                if request_take_off(craft) {
                    return;
                }
                let here = craft.tile();
                let portal = target.or_else(|| {
                    ctx.view
                        .portals()
                        .iter()
                        .copied()
                        .min_by_key(|p| ((*p - here).length_squared(), p.x, p.y, p.z))
                });
                let Some(portal) = portal else {
                    warn!(craft = %craft.id(), "no portal on the map");
                    self.cancel();
                    return;
                };
                if let MissionKind::GotoPortal { target: slot, .. } = &mut self.kind {
                    *slot = Some(portal);
                }
                self.set_path_to(craft, &*ctx.terrain, iterations, portal, false);
            }
            MissionKind::TakeOff { .. } => {
                let Some(building) = craft.current_building else {
                    return;
                };
                if !craft.leave_building(ctx) {
                    return;
                }
                let climb = craft.tile() + IVec3::Z;
                let here = Some(craft.tile());
                let target = (!craft.class().is_ground()
                    && ctx
                        .terrain
                        .can_enter(craft.class(), here, climb, EnterQuery::default()))
                .then_some(climb);
                self.kind = MissionKind::TakeOff {
                    building: Some(building),
                    target,
                };
            }
            MissionKind::Crash => {
                if matches!(craft.regime, Regime::Falling | Regime::Sliding)
                    || craft.rests_on_ground(&*ctx.terrain)
                {
                    return;
                }
                craft.regime = Regime::Controlled;
                craft.start_falling(None, ctx);
            }
            MissionKind::InfiltrateSubvert {
                target,
                subvert,
                dispatched,
                done,
            } => {
                if done {
                    return;
                }
                let outcome = Self::visit(craft, ctx, target, dispatched);
                if outcome == Visit::Arrived {
                    ctx.emit(CraftEvent::Infiltrated {
                        craft: craft.id(),
                        building: target,
                        subvert,
                    });
                }
                self.kind = MissionKind::InfiltrateSubvert {
                    target,
                    subvert,
                    dispatched: true,
                    done: outcome != Visit::Dispatched,
                };
            }
            MissionKind::OfferService {
                target,
                dispatched,
                done,
            } => {
                if done {
                    return;
                }
                let Some(building) = target
                    .or(craft.current_building)
                    .or(craft.home_building)
                else {
                    warn!(craft = %craft.id(), "no building to offer a service at");
                    self.kind = MissionKind::OfferService {
                        target,
                        dispatched,
                        done: true,
                    };
                    return;
                };
                let outcome = Self::visit(craft, ctx, building, dispatched);
                if outcome == Visit::Arrived {
                    ctx.emit(CraftEvent::ServiceOffered {
                        craft: craft.id(),
                        building,
                    });
                }
                self.kind = MissionKind::OfferService {
                    target: Some(building),
                    dispatched: true,
                    done: outcome != Visit::Dispatched,
                };
            }
            MissionKind::Teleport { target } => teleport(craft, ctx, target),
            MissionKind::RestartNextMission
            | MissionKind::Snooze { .. }
            | MissionKind::Land { .. }
            | MissionKind::SelfDestruct { .. } => {}
        }
    }

    /// Sends the craft to `building` unless it is already inside.
    fn visit(
        craft: &mut Craft,
        ctx: &SimContext<'_>,
        building: BuildingId,
        dispatched: bool,
    ) -> Visit {
        if craft.current_building == Some(building) {
            Visit::Arrived
        } else if dispatched {
            debug!(craft = %craft.id(), %building, "never reached the building");
            Visit::Failed
        } else {
            craft.defer_mission(Mission::goto_building(Some(building), ctx.config), false);
            Visit::Dispatched
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Per-tick update while at the queue front.
    pub(crate) fn update(&mut self, craft: &mut Craft, ctx: &mut SimContext<'_>, ticks: u32) {
        match &mut self.kind {
            MissionKind::Snooze { remaining } => {
                *remaining = remaining.saturating_sub(ticks);
            }
            MissionKind::SelfDestruct { remaining } => {
                *remaining = remaining.saturating_sub(ticks);
                if *remaining == 0 {
                    craft.die(None, false, ctx);
                }
            }
            MissionKind::FollowVehicle { target } | MissionKind::AttackVehicle { target, .. } => {
                // A path to where the target used to be is re-planned at the
                // next goal request.
                let moved = target
                    .and_then(|t| ctx.view.craft(t))
                    .map(|other| tile_of(other.position))
                    .is_some_and(|tile| self.planned_path.back().is_some_and(|end| *end != tile));
                if moved {
                    self.planned_path.clear();
                }
            }
            _ => {}
        }
    }

    // =========================================================================
    // Finish check
    // =========================================================================

    /// Whether the mission is done and should be popped.
    pub(crate) fn is_finished(&self, craft: &Craft, ctx: &SimContext<'_>) -> bool {
        if self.cancelled {
            return true;
        }
        match self.kind {
            MissionKind::GotoLocation {
                target,
                picked_nearest,
                reroute_attempts,
                ..
            } => {
                craft.current_building.is_none()
                    && self.planned_path.is_empty()
                    && (craft.tile() == target || picked_nearest || reroute_attempts == 0)
            }
            MissionKind::GotoBuilding {
                target,
                reroute_attempts,
                ..
            } => match target {
                None => true,
                Some(target) => {
                    craft.current_building == Some(target)
                        || ctx.view.building(target).is_none()
                        || (reroute_attempts == 0 && self.planned_path.is_empty())
                }
            },
            MissionKind::FollowVehicle { target } => target
                .and_then(|t| ctx.view.craft(t))
                .map_or(true, |other| other.current_building.is_some()),
            MissionKind::AttackVehicle {
                target,
                attack_crashed,
            } => target
                .and_then(|t| ctx.view.craft(t))
                .map_or(true, |other| {
                    other.current_building.is_some() || (!attack_crashed && other.is_downed())
                }),
            MissionKind::RecoverVehicle { target, attached } => {
                attached
                    || target
                        .and_then(|t| ctx.view.craft(t))
                        .map_or(true, |other| {
                            other.regime != Regime::Crashed
                                || other.carried_by.is_some_and(|by| by != craft.id())
                        })
            }
            MissionKind::AttackBuilding { target } => ctx.view.building(target).is_none(),
            MissionKind::RestartNextMission | MissionKind::Teleport { .. } => true,
            MissionKind::Snooze { remaining } | MissionKind::SelfDestruct { remaining } => {
                remaining == 0
            }
            MissionKind::TakeOff { target, .. } => {
                craft.current_building.is_none()
                    && target.map_or(true, |t| craft.tile() == t)
            }
            MissionKind::Land { building } => {
                craft.current_building == Some(building) || ctx.view.building(building).is_none()
            }
            MissionKind::Crash => craft.regime == Regime::Crashed,
            MissionKind::Patrol { counter, .. } => counter == 0 && self.planned_path.is_empty(),
            MissionKind::GotoPortal { target, departed } => departed || target.is_none(),
            MissionKind::InfiltrateSubvert { done, .. } | MissionKind::OfferService { done, .. } => {
                done
            }
        }
    }

    // =========================================================================
    // Goal production
    // =========================================================================

    /// Produces the craft's next goal, or `None` when the mission has
    /// nowhere to go right now.
    pub(crate) fn next_destination(
        &mut self,
        craft: &mut Craft,
        ctx: &mut SimContext<'_>,
    ) -> Option<Goal> {
        if craft.current_building.is_some() && !matches!(self.kind, MissionKind::TakeOff { .. }) {
            return None;
        }
        let iterations = ctx.config.missions.path_iterations;
        match self.kind {
            MissionKind::GotoLocation {
                target,
                pick_nearest,
                picked_nearest,
                reroute_attempts,
                ..
            } => {
                if let Some(goal) = self.advance_along_path(craft, &*ctx.terrain) {
                    return Some(goal);
                }
                if craft.tile() == target || picked_nearest || reroute_attempts == 0 {
                    return None;
                }
                self.spend_reroute();
                debug!(craft = %craft.id(), mission = %self, "re-routing");
                self.plan_location(craft, ctx, target, pick_nearest);
                self.advance_along_path(craft, &*ctx.terrain)
            }
            MissionKind::GotoBuilding {
                target: Some(target),
                reroute_attempts,
                ..
            } => {
                let Some(approach) = ctx
                    .view
                    .building(target)
                    .and_then(|b| approach_tile(b, craft.class()))
                else {
                    self.cancel();
                    return None;
                };
                if let Some(goal) = self.advance_along_path(craft, &*ctx.terrain) {
                    return Some(goal);
                }
                if craft.tile() == approach {
                    if craft.class().is_ground() {
                        craft.enter_building(target, ctx);
                    } else {
                        craft.defer_mission(Mission::land(target), false);
                    }
                    return None;
                }
                if reroute_attempts == 0 {
                    return None;
                }
                self.spend_reroute();
                self.set_path_to(craft, &*ctx.terrain, iterations, approach, false);
                self.advance_along_path(craft, &*ctx.terrain)
            }
            MissionKind::FollowVehicle { target } | MissionKind::AttackVehicle { target, .. } => {
                let other = target.and_then(|t| ctx.view.craft(t))?;
                let there = tile_of(other.position);
                let offset = (there - craft.tile()).abs();
                if offset.max_element() <= 1 {
                    self.planned_path.clear();
                    return None;
                }
                if self.planned_path.back() != Some(&there) {
                    self.set_path_to(craft, &*ctx.terrain, iterations, there, true);
                }
                self.advance_along_path(craft, &*ctx.terrain)
            }
            MissionKind::RecoverVehicle {
                target: Some(target),
                attached: false,
            } => {
                let other = ctx.view.craft(target)?;
                let above = tile_of(other.position) + IVec3::Z;
                if craft.tile() == above {
                    craft.carrying = Some(target);
                    self.kind = MissionKind::RecoverVehicle {
                        target: Some(target),
                        attached: true,
                    };
                    debug!(craft = %craft.id(), carried = %target, "picked up craft");
                    ctx.emit(CraftEvent::Attached {
                        carrier: craft.id(),
                        carried: target,
                    });
                    craft.defer_mission(Mission::goto_building(None, ctx.config), true);
                    return None;
                }
                if self.planned_path.back() != Some(&above) {
                    self.set_path_to(craft, &*ctx.terrain, iterations, above, true);
                }
                self.advance_along_path(craft, &*ctx.terrain)
            }
            MissionKind::AttackBuilding { target } => {
                let centre = ctx.view.building(target).and_then(|b| {
                    b.landing_pads.first().or_else(|| b.car_entrances.first()).copied()
                })?;
                if let Some(goal) = self.advance_along_path(craft, &*ctx.terrain) {
                    return Some(goal);
                }
                let z = craft.tile().z;
                for _ in 0..PLACEMENT_TRIES {
                    let tile = IVec3::new(
                        centre.x + ctx.rng.gen_range(-ATTACK_RADIUS..=ATTACK_RADIUS),
                        centre.y + ctx.rng.gen_range(-ATTACK_RADIUS..=ATTACK_RADIUS),
                        z,
                    );
                    if tile != craft.tile()
                        && ctx.terrain.can_enter(craft.class(), None, tile, EnterQuery::default())
                    {
                        self.set_path_to(craft, &*ctx.terrain, iterations, tile, true);
                        return self.advance_along_path(craft, &*ctx.terrain);
                    }
                }
                None
            }
            MissionKind::Patrol { home, counter } => {
                if let Some(goal) = self.advance_along_path(craft, &*ctx.terrain) {
                    return Some(goal);
                }
                if counter == 0 {
                    return None;
                }
                if let MissionKind::Patrol { counter, .. } = &mut self.kind {
                    *counter -= 1;
                }
                let tile = patrol_destination(craft, ctx, home)?;
                self.set_path_to(craft, &*ctx.terrain, iterations, tile, true);
                self.advance_along_path(craft, &*ctx.terrain)
            }
            MissionKind::GotoPortal {
                target: Some(portal),
                departed: false,
            } => {
                if craft.tile() == portal {
                    craft.departed = true;
                    self.kind = MissionKind::GotoPortal {
                        target: Some(portal),
                        departed: true,
                    };
                    debug!(craft = %craft.id(), ?portal, "left through portal");
                    ctx.emit(CraftEvent::DepartedThroughPortal {
                        craft: craft.id(),
                        portal,
                    });
                    return None;
                }
                if let Some(goal) = self.advance_along_path(craft, &*ctx.terrain) {
                    return Some(goal);
                }
                if !self.set_path_to(craft, &*ctx.terrain, iterations, portal, false) {
                    warn!(craft = %craft.id(), ?portal, "portal unreachable");
                    self.cancel();
                    return None;
                }
                self.advance_along_path(craft, &*ctx.terrain)
            }
            MissionKind::Land { building } => {
                let pad = ctx
                    .view
                    .building(building)
                    .and_then(|b| b.exit_tile(craft.class()))?;
                if craft.tile() == pad {
                    craft.enter_building(building, ctx);
                    return None;
                }
                Some(Goal {
                    position: destination(&*ctx.terrain, craft.class(), pad),
                    facing: craft.facing,
                })
            }
            MissionKind::TakeOff {
                target: Some(target),
                ..
            } => (craft.tile() != target).then(|| Goal {
                position: destination(&*ctx.terrain, craft.class(), target),
                facing: craft.facing,
            }),
            _ => None,
        }
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    /// Plans a path to `target`, replacing the current one. Returns `true` if
    /// a path was found.
    pub(crate) fn set_path_to(
        &mut self,
        craft: &Craft,
        terrain: &dyn Terrain,
        max_iterations: usize,
        target: IVec3,
        pick_nearest: bool,
    ) -> bool {
        self.planned_path.clear();
        let Some(found) = path::find_path(
            terrain,
            craft.class(),
            craft.tile(),
            target,
            max_iterations,
            pick_nearest,
        ) else {
            return false;
        };
        self.planned_path = found.tiles.into();
        if found.picked_nearest {
            if let MissionKind::GotoLocation { picked_nearest, .. } = &mut self.kind {
                *picked_nearest = true;
            }
        }
        true
    }

    /// Next goal along the planned path. Leading tiles the craft already
    /// occupies are dropped; a blocked next tile clears the path so that it
    /// is planned again.
    pub(crate) fn advance_along_path(&mut self, craft: &Craft, terrain: &dyn Terrain) -> Option<Goal> {
        let here = craft.tile();
        while self.planned_path.front() == Some(&here) {
            self.planned_path.pop_front();
        }
        let next = *self.planned_path.front()?;
        if !terrain.can_enter(craft.class(), Some(here), next, EnterQuery::default()) {
            debug!(craft = %craft.id(), ?next, "path blocked");
            self.planned_path.clear();
            return None;
        }
        Some(Goal {
            position: destination(terrain, craft.class(), next),
            facing: craft.facing,
        })
    }

    fn plan_location(
        &mut self,
        craft: &Craft,
        ctx: &SimContext<'_>,
        target: IVec3,
        pick_nearest: bool,
    ) {
        let iterations = ctx.config.missions.path_iterations;
        if !self.set_path_to(craft, &*ctx.terrain, iterations, target, pick_nearest) {
            debug!(craft = %craft.id(), ?target, "no path to location");
        }
    }

    fn spend_reroute(&mut self) {
        match &mut self.kind {
            MissionKind::GotoLocation {
                reroute_attempts, ..
            }
            | MissionKind::GotoBuilding {
                reroute_attempts, ..
            } => *reroute_attempts = reroute_attempts.saturating_sub(1),
            _ => {}
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Visit {
    Arrived,
    Dispatched,
    Failed,
}

/// Queues a take-off in front of the running mission if the craft is
/// parked. Returns `true` if it did.
fn request_take_off(craft: &mut Craft) -> bool {
    if craft.current_building.is_none() {
        return false;
    }
    craft.defer_mission(Mission::take_off(), false);
    true
}

/// Tile a craft aims for before docking: above the pad for flyers, the car
/// entrance for ground craft.
fn approach_tile(building: &Building, class: CraftClass) -> Option<IVec3> {
    let exit = building.exit_tile(class)?;
    Some(if class.is_ground() { exit } else { exit + IVec3::Z })
}

fn patrol_destination(craft: &Craft, ctx: &mut SimContext<'_>, home: bool) -> Option<IVec3> {
    let size = ctx.terrain.size();
    let radius = ctx.config.missions.patrol_home_radius;
    let centre = home
        .then_some(craft.home_building)
        .flatten()
        .and_then(|b| ctx.view.building(b))
        .and_then(|b| b.exit_tile(craft.class()));
    for _ in 0..PLACEMENT_TRIES {
        let (x, y) = match centre {
            Some(c) => (
                c.x + ctx.rng.gen_range(-radius..=radius),
                c.y + ctx.rng.gen_range(-radius..=radius),
            ),
            None => (ctx.rng.gen_range(0..size.x.max(1)), ctx.rng.gen_range(0..size.y.max(1))),
        };
        let tile = if craft.class().is_ground() {
            (0..size.z)
                .rev()
                .map(|z| IVec3::new(x, y, z))
                .find(|t| ctx.terrain.can_enter(craft.class(), None, *t, EnterQuery::default()))
        } else {
            let z = craft.altitude.tier().clamp(0, size.z - 1);
            let t = IVec3::new(x, y, z);
            ctx.terrain
                .can_enter(craft.class(), None, t, EnterQuery::default())
                .then_some(t)
        };
        if tile.is_some() {
            return tile;
        }
    }
    debug!(craft = %craft.id(), "no patrol destination found");
    None
}

/// Jumps near `target` (or anywhere) with a charged teleporter.
fn teleport(craft: &mut Craft, ctx: &mut SimContext<'_>, target: Option<IVec3>) {
    if !craft.can_teleport(ctx.config) {
        debug!(craft = %craft.id(), "teleporter not ready");
        return;
    }
    let size = ctx.terrain.size();
    let centre = target.unwrap_or_else(|| {
        IVec3::new(
            ctx.rng.gen_range(0..size.x.max(1)),
            ctx.rng.gen_range(0..size.y.max(1)),
            ctx.rng.gen_range(0..size.z.max(1)),
        )
    });
    let spread = ctx.config.missions.teleporter_spread;
    for _ in 0..PLACEMENT_TRIES {
        let tile = centre
            + IVec3::new(
                ctx.rng.gen_range(-spread..=spread),
                ctx.rng.gen_range(-spread..=spread),
                0,
            );
        if !ctx.terrain.can_enter(craft.class(), None, tile, EnterQuery::default()) {
            continue;
        }
        let from = craft.position;
        let to = destination(&*ctx.terrain, craft.class(), tile);
        craft.position = to;
        craft.goal_position = to;
        craft.velocity = glam::Vec3::ZERO;
        craft.goal_waypoints.clear();
        craft.teleport_charge = 0;
        debug!(craft = %craft.id(), ?from, ?to, "teleported");
        ctx.emit(CraftEvent::Teleported {
            craft: craft.id(),
            from,
            to,
        });
        return;
    }
    warn!(craft = %craft.id(), ?centre, "no free tile to teleport to");
}
