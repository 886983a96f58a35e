//! Controlled flight.

use glam::IVec3;
use tracing::debug;

use crate::craft::{facing_towards, wrap_angle, Craft, Regime};
use crate::entity::MoverKind;
use crate::mission::{Mission, MissionType};
use crate::mover::{dodge, translate, MotionReport, Mover};
use crate::terrain::EnterQuery;
use crate::world_view::SimContext;

/// Engine for flying craft: timed turns, altitude keeping and projectile
/// dodging.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlyingMover;

impl Mover for FlyingMover {
    fn kind(&self) -> MoverKind {
        MoverKind::Flying
    }

    fn update_controlled(
        &self,
        craft: &mut Craft,
        ticks: u32,
        ctx: &mut SimContext<'_>,
    ) -> MotionReport {
        let tps = ctx.config.tps();
        let mut budget = ticks;
        let mut report = MotionReport::default();
        let mut last = None;

        while last != Some(budget) {
            last = Some(budget);
            if !ctx.terrain.is_valid(craft.tile()) {
                break;
            }

            // Turning and moving share the same ticks.
            let turned = if budget > 0 && craft.facing != craft.goal_facing {
                advance_turn(craft, budget)
            } else {
                0
            };
            let moved = if budget > 0 && craft.goal_position != craft.position {
                translate(craft, budget, tps)
            } else {
                0
            };
            report.record(turned, moved);
            budget -= turned.max(moved);

            if craft.position == craft.goal_position && craft.facing == craft.goal_facing {
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
                let speed = craft.speed();
                let heading = craft.goal_position - craft.position;
                if heading != glam::Vec3::ZERO {
                    craft.velocity = heading.normalize() * speed;
                    if let Some(facing) = facing_towards(heading) {
                        craft.goal_facing = facing;
                    }
                }
                if craft.facing != craft.goal_facing {
                    begin_turn(craft, ctx);
                }
            }
        }

        report
    }

    fn update_idle(&self, craft: &mut Craft, ctx: &mut SimContext<'_>) {
        if craft.regime != Regime::Controlled || craft.carried_by.is_some() {
            return;
        }
        if craft
            .front_mission()
            .is_some_and(|m| matches!(m.mission_type(), MissionType::TakeOff | MissionType::Land))
        {
            return;
        }
        if craft.position.z < ctx.config.dodge.min_idle_height {
            return;
        }
        if craft.ticks_auto_action_available > ctx.now() {
            return;
        }
        craft.ticks_auto_action_available = ctx.now() + ctx.config.auto_action_delay;

        if craft.missions.is_empty() {
            craft.drop_carried(ctx);
            if keep_altitude(craft, ctx) {
                return;
            }
        }
        dodge::try_dodge(craft, ctx);
    }
}

/// Spends turning ticks. Returns how many were used.
fn advance_turn(craft: &mut Craft, budget: u32) -> u32 {
    if craft.ticks_to_turn > budget {
        craft.ticks_to_turn -= budget;
        #[allow(clippy::cast_precision_loss)]
        let swept = craft.angular_velocity * budget as f32;
        craft.facing = wrap_angle(craft.facing + swept);
        budget
    } else {
        let used = craft.ticks_to_turn;
        craft.facing = craft.goal_facing;
        craft.ticks_to_turn = 0;
        craft.angular_velocity = 0.0;
        craft.ticks_auto_action_available = 0;
        used
    }
}

/// Starts a turn towards the goal facing, taking the shorter way round.
///
/// A turn that would outlast the trip slows the craft down so that both
/// finish together.
fn begin_turn(craft: &mut Craft, ctx: &SimContext<'_>) {
    let turning = &ctx.config.turning;
    let rate = craft.speed() * turning.rate_per_speed;
    if rate <= 0.0 {
        craft.facing = craft.goal_facing;
        craft.angular_velocity = 0.0;
        craft.ticks_to_turn = 0;
        return;
    }

    let clockwise = wrap_angle(craft.goal_facing - craft.facing);
    let counter = wrap_angle(craft.facing - craft.goal_facing);
    if clockwise <= counter {
        craft.angular_velocity = rate;
        craft.facing = wrap_angle(craft.facing - turning.start_nudge);
    } else {
        craft.angular_velocity = -rate;
        craft.facing = wrap_angle(craft.facing + turning.start_nudge);
    }
    let sweep = clockwise.min(counter) + turning.overshoot;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let turn_ticks = (sweep / craft.angular_velocity).abs().floor() as u32;
    craft.ticks_to_turn = turn_ticks;

    let distance = (craft.goal_position - craft.position).length();
    let speed = craft.velocity.length();
    if distance > 0.0 && speed > 0.0 && turn_ticks > 0 {
        #[allow(clippy::cast_possible_truncation)]
        let travel_ticks = (distance / speed * ctx.config.tps()).floor() as i64;
        let travel_ticks = (travel_ticks - turning.velocity_margin_ticks).max(1);
        if travel_ticks < i64::from(turn_ticks) {
            #[allow(clippy::cast_precision_loss)]
            let slow_down = travel_ticks as f32 / turn_ticks as f32;
            craft.velocity *= slow_down;
        }
    }
}

/// Climbs or descends one tier towards the preferred altitude. Returns
/// `true` if a move was queued.
fn keep_altitude(craft: &mut Craft, ctx: &mut SimContext<'_>) -> bool {
    let here = craft.tile();
    let preferred = craft.altitude.tier();
    if here.z == preferred {
        return false;
    }
    let step = if here.z < preferred { IVec3::Z } else { -IVec3::Z };
    let target = here + step;
    if !ctx
        .terrain
        .can_enter(craft.class(), Some(here), target, EnterQuery::default())
    {
        return false;
    }
    if let Some(front) = craft.missions.front_mut() {
        front.planned_path.clear();
    }
    let mission = Mission::goto_location(target, ctx.config).with_planned_path([here, target]);
    match craft.add_mission(mission, false, ctx) {
        Ok(()) => {
            debug!(craft = %craft.id(), ?target, "returning to cruise altitude");
            true
        }
        Err(_) => false,
    }
}
