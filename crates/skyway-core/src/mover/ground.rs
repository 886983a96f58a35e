//! Controlled driving.
//!
//! Ground craft turn instantly and spend a single tick budget on
//! translation. A goal on another tier is never approached in a straight
//! diagonal: the engine inserts waypoints so the height change happens on a
//! flat stretch of road (see [`tier_waypoints`]).

use glam::Vec3;
use tracing::{debug, warn};

use crate::craft::{facing_towards, Craft, Regime};
use crate::entity::MoverKind;
use crate::mover::{translate, MotionReport, Mover};
use crate::terrain::tile_of;
use crate::world_view::SimContext;

/// A height fraction below this, or above its complement, counts as flat.
const FLAT_BELOW: f32 = 0.25;
const FLAT_ABOVE: f32 = 0.75;

/// Engine for ground craft.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundMover;

impl Mover for GroundMover {
    fn kind(&self) -> MoverKind {
        MoverKind::Ground
    }

    fn update_controlled(
        &self,
        craft: &mut Craft,
        ticks: u32,
        ctx: &mut SimContext<'_>,
    ) -> MotionReport {
        if is_airborne(craft, ctx) {
            if ctx.config.features.crashing_ground_vehicles {
                debug!(craft = %craft.id(), "ground craft lost its road");
                craft.start_falling(None, ctx);
            } else {
                warn!(craft = %craft.id(), "ground craft off the road, destroying");
                craft.die(None, false, ctx);
            }
            return MotionReport::default();
        }

        let tps = ctx.config.tps();
        let mut budget = ticks;
        let mut last = None;
        while last != Some(budget) {
            last = Some(budget);
            if !ctx.terrain.is_valid(craft.tile()) {
                break;
            }

            if budget > 0 && craft.goal_position != craft.position {
                budget -= translate(craft, budget, tps);
            }
            if craft.position != craft.goal_position {
                continue;
            }

            let from_waypoint = if let Some(next) = craft.goal_waypoints.pop_front() {
                craft.goal_position = next;
                true
            } else {
                craft.pop_finished_missions(ctx);
                if !craft.is_alive() {
                    break;
                }
                self.update_idle(craft, ctx);
                let Some(goal) = craft.get_new_goal(ctx) else {
                    break;
                };
                if !craft.is_alive() || craft.regime != Regime::Controlled {
                    break;
                }
                craft.goal_position = goal.position;
                craft.goal_facing = goal.facing;
                false
            };

            if craft.position != craft.goal_position {
                if !from_waypoint && craft.position.z != craft.goal_position.z {
                    let (first, rest) = tier_waypoints(craft.position, craft.goal_position);
                    craft.goal_position = first;
                    for waypoint in rest.into_iter().rev() {
                        craft.goal_waypoints.push_front(waypoint);
                    }
                }
                let heading = craft.goal_position - craft.position;
                craft.velocity = heading.normalize_or_zero() * craft.speed();
                if let Some(facing) = facing_towards(heading) {
                    craft.goal_facing = facing;
                }
            }
            craft.facing = craft.goal_facing;
        }

        MotionReport {
            ticks_turned: 0,
            ticks_moved: ticks - budget,
        }
    }

    fn update_idle(&self, craft: &mut Craft, ctx: &mut SimContext<'_>) {
        if craft.ticks_auto_action_available > ctx.now() {
            return;
        }
        craft.ticks_auto_action_available = ctx.now() + ctx.config.auto_action_delay;
    }
}

/// Whether the craft, its goal and its last waypoint all hang over empty
/// tiles.
fn is_airborne(craft: &Craft, ctx: &SimContext<'_>) -> bool {
    let empty = |position: Vec3| ctx.terrain.scenery(tile_of(position)).is_none();
    empty(craft.position)
        && empty(craft.goal_position)
        && craft.goal_waypoints.back().map_or(true, |w| empty(*w))
}

fn is_flat(z: f32) -> bool {
    let fraction = z - z.floor();
    !(FLAT_BELOW..=FLAT_ABOVE).contains(&fraction)
}

/// Splits a move from `from` to a goal on another tier into an immediate
/// goal plus the waypoints that follow it.
///
/// - flat to flat: change height between two points just either side of the
///   middle of the move
/// - flat to sloped: drive to the middle, then climb
/// - sloped to flat: climb to the middle, then drive
/// - sloped to sloped: straight there
pub(crate) fn tier_waypoints(from: Vec3, goal: Vec3) -> (Vec3, Vec<Vec3>) {
    match (is_flat(from.z), is_flat(goal.z)) {
        (true, true) => {
            let before = (from * 0.55 + goal * 0.45).truncate().extend(from.z);
            let after = (from * 0.45 + goal * 0.55).truncate().extend(goal.z);
            (before, vec![after, goal])
        }
        (true, false) => {
            let middle = ((from + goal) / 2.0).truncate().extend(from.z);
            (middle, vec![goal])
        }
        (false, true) => {
            let middle = ((from + goal) / 2.0).truncate().extend(goal.z);
            (middle, vec![goal])
        }
        (false, false) => (goal, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use glam::{IVec3, Vec3};

    use super::*;
    use crate::entity::CraftClass;
    use crate::mission::Mission;
    use crate::terrain::Scenery;
    use crate::tests::helpers::Harness;

    mod waypoint_tests {
        use super::*;

        #[test]
        fn flatness_thresholds() {
            assert!(is_flat(1.125));
            assert!(is_flat(1.8));
            assert!(!is_flat(1.25));
            assert!(!is_flat(1.5));
            assert!(!is_flat(1.75));
        }

        #[test]
        fn flat_to_flat_uses_two_midpoints() {
            let from = Vec3::new(0.5, 0.5, 1.125);
            let goal = Vec3::new(1.5, 0.5, 2.125);
            let (first, rest) = tier_waypoints(from, goal);
            assert!((first.x - 0.95).abs() < 1e-5);
            assert_eq!(first.z, 1.125);
            assert_eq!(rest.len(), 2);
            assert!((rest[0].x - 1.05).abs() < 1e-5);
            assert_eq!(rest[0].z, 2.125);
            assert_eq!(rest[1], goal);
        }

        #[test]
        fn flat_to_ramp_climbs_after_middle() {
            let from = Vec3::new(0.5, 0.5, 1.125);
            let goal = Vec3::new(1.5, 0.5, 1.5);
            let (first, rest) = tier_waypoints(from, goal);
            assert_eq!(first, Vec3::new(1.0, 0.5, 1.125));
            assert_eq!(rest, vec![goal]);
        }

        #[test]
        fn ramp_to_flat_climbs_before_middle() {
            let from = Vec3::new(0.5, 0.5, 1.5);
            let goal = Vec3::new(1.5, 0.5, 2.125);
            let (first, rest) = tier_waypoints(from, goal);
            assert_eq!(first, Vec3::new(1.0, 0.5, 2.125));
            assert_eq!(rest, vec![goal]);
        }

        #[test]
        fn ramp_to_ramp_goes_straight() {
            let from = Vec3::new(0.5, 0.5, 1.5);
            let goal = Vec3::new(1.5, 0.5, 2.5);
            assert_eq!(tier_waypoints(from, goal), (goal, Vec::new()));
        }
    }

    mod drive_tests {
        use super::*;

        #[test]
        fn tier_change_inserts_two_waypoints() {
            let mut h = Harness::roads();
            h.terrain_mut().set(IVec3::new(5, 5, 1), Scenery::road(1));
            h.terrain_mut().set(IVec3::new(6, 5, 2), Scenery::road(2));
            let id = h.spawn(CraftClass::Road, Vec3::new(5.5, 5.5, 1.125));
            h.add_mission(id, Mission::goto_location(IVec3::new(6, 5, 2), h.config()), true)
                .unwrap();
            h.update(1);
            let craft = h.craft(id);
            assert_eq!(craft.goal_position.z, 1.125);
            assert_eq!(craft.goal_waypoints().len(), 2);
            assert_eq!(craft.facing, craft.goal_facing);
        }

        #[test]
        fn drives_to_destination_on_flat_road() {
            let mut h = Harness::roads();
            let id = h.spawn(CraftClass::Road, Vec3::new(1.5, 1.5, 1.125));
            h.add_mission(id, Mission::goto_location(IVec3::new(5, 1, 1), h.config()), true)
                .unwrap();
            h.update(144 * 2);
            let craft = h.craft(id);
            assert_eq!(craft.tile(), IVec3::new(5, 1, 1));
            assert!(craft.missions().is_empty());
        }

        #[test]
        fn craft_over_a_gap_falls() {
            let mut h = Harness::roads();
            let id = h.spawn(CraftClass::Atv, Vec3::new(3.5, 3.5, 4.5));
            h.update(1);
            assert_eq!(h.craft(id).regime(), Regime::Falling);
        }

        #[test]
        fn craft_over_a_gap_dies_without_crash_feature() {
            let mut h = Harness::roads_with(|config| {
                config.features.crashing_ground_vehicles = false;
            });
            let id = h.spawn(CraftClass::Atv, Vec3::new(3.5, 3.5, 4.5));
            h.update(1);
            assert!(h.get(id).map_or(true, Craft::is_destroyed));
        }
    }
}
