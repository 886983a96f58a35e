//! Movement engines.
//!
//! A [`Mover`] advances a craft's physical state. The downed regimes
//! (falling, sliding, crashed) and being carried behave the same for every
//! craft and are handled by the trait's provided [`Mover::update`]; only the
//! controlled regime differs:
//!
//! | Engine | Turning | Tier changes | Idle heuristics |
//! |---|---|---|---|
//! | [`FlyingMover`] | timed, at a rate scaled by speed | free | altitude keeping, projectile dodge |
//! | [`GroundMover`] | instant | synthesized mid-waypoints | none |
//!
//! # Tick subdivision
//!
//! Within one update the controlled loop spends two budgets, one for turning
//! and one for translation, each starting at the tick count. A new goal is
//! requested whenever both the goal position and goal facing are reached,
//! so several goals may be consumed in one update. The loop stops when an
//! iteration consumes nothing from either budget.

mod dodge;
mod flying;
mod ground;
mod regimes;

pub use flying::FlyingMover;
pub use ground::GroundMover;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::craft::{Craft, Regime};
use crate::entity::MoverKind;
use crate::world_view::SimContext;

/// How an update's ticks were spent. The two counts never overlap, so their
/// sum is at most the ticks handed to the update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionReport {
    /// Ticks spent turning in place.
    pub ticks_turned: u32,
    /// Ticks spent translating, turning or not.
    pub ticks_moved: u32,
}

impl MotionReport {
    /// Ticks accounted for.
    #[must_use]
    pub const fn ticks_spent(&self) -> u32 {
        self.ticks_turned + self.ticks_moved
    }

    /// Books one concurrent step of `turned` turning and `moved` moving ticks.
    fn record(&mut self, turned: u32, moved: u32) {
        self.ticks_moved += moved;
        self.ticks_turned += turned.saturating_sub(moved);
    }
}

/// Per-class movement engine.
pub trait Mover: Sync {
    /// Engine identity.
    fn kind(&self) -> MoverKind;

    /// Advances a craft in the controlled regime.
    fn update_controlled(&self, craft: &mut Craft, ticks: u32, ctx: &mut SimContext<'_>)
        -> MotionReport;

    /// Idle heuristics, run when a craft reaches its goal.
    fn update_idle(&self, craft: &mut Craft, ctx: &mut SimContext<'_>);

    /// Advances a craft in whatever regime it is in.
    fn update(&self, craft: &mut Craft, ticks: u32, ctx: &mut SimContext<'_>) -> MotionReport {
        match craft.regime {
            Regime::Falling => {
                regimes::update_falling(craft, ticks, ctx);
                return MotionReport::default();
            }
            Regime::Sliding => {
                regimes::update_sliding(craft, ticks, ctx);
                return MotionReport::default();
            }
            Regime::Controlled | Regime::Crashed => {}
        }
        if let Some(carrier) = craft.carried_by {
            regimes::update_carried(craft, carrier, ctx);
            return MotionReport::default();
        }
        if craft.regime == Regime::Crashed {
            regimes::update_crashed(craft, ctx);
            return MotionReport::default();
        }
        self.update_controlled(craft, ticks, ctx)
    }
}

/// Engine for a mover kind.
#[must_use]
pub fn mover_for(kind: MoverKind) -> &'static dyn Mover {
    match kind {
        MoverKind::Flying => &FlyingMover,
        MoverKind::Ground => &GroundMover,
    }
}

/// Ticks needed to cover `distance` at `speed` tiles per second.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn ticks_to_cover(distance: f32, speed: f32, ticks_per_second: f32) -> u32 {
    let per_tick = (speed / ticks_per_second).max(0.000_01);
    (distance / per_tick).floor() as u32
}

/// Moves the craft towards its goal for at most `budget` ticks. Returns the
/// ticks spent; arriving zeroes the velocity.
fn translate(craft: &mut Craft, budget: u32, ticks_per_second: f32) -> u32 {
    let to_goal = craft.goal_position - craft.position;
    let needed = ticks_to_cover(to_goal.length(), craft.velocity.length(), ticks_per_second);
    if needed > budget {
        #[allow(clippy::cast_precision_loss)]
        let seconds = budget as f32 / ticks_per_second;
        craft.position += craft.velocity * seconds;
        budget
    } else {
        craft.position = craft.goal_position;
        craft.velocity = Vec3::ZERO;
        needed
    }
}
