//! Mission queue operations on [`Craft`].
//!
//! The queue front is the mission in charge. Placement follows these rules:
//!
//! - a kind blocked by the craft's physical state ([`MissionType::blockers`])
//!   is refused and dropped
//! - a front request that is not front-insertable lands *behind* an
//!   in-progress take-off or landing
//! - a front request, a front-insertable kind, or any mission on an empty
//!   queue goes to the front and starts immediately
//! - everything else is appended
//!
//! While a mission runs it is temporarily popped off the queue, so missions
//! that want to queue another mission use [`Craft::defer_mission`]; the
//! request is placed as soon as the running mission is back in front.

use tracing::debug;

use crate::craft::Craft;
use crate::error::PlacementError;
use crate::mission::{Goal, Mission, MissionType};
use crate::world_view::SimContext;

/// Rounds of "ask the front for a goal, pop if it finished" before giving
/// up for this tick.
const GOAL_ROUNDS: usize = 16;

impl Craft {
    /// Places `mission` in the queue.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::Blocked`] if the craft's current physical
    /// state refuses this mission kind. The mission is dropped.
    pub fn add_mission(
        &mut self,
        mission: Mission,
        to_back: bool,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), PlacementError> {
        let kind = mission.mission_type();
        let blockers = self.blockers() & kind.blockers();
        if !blockers.is_empty() {
            debug!(craft = %self.id(), mission = %kind, ?blockers, "mission refused");
            return Err(PlacementError::Blocked {
                mission: kind,
                blockers,
            });
        }

        let front_committed = self
            .missions
            .front()
            .is_some_and(|m| m.mission_type().is_committed());
        if !to_back && !kind.is_front_insertable() && front_committed {
            debug!(craft = %self.id(), %mission, "mission queued behind take-off or landing");
            self.missions.insert(1, mission);
        } else if !to_back || kind.is_front_insertable() || self.missions.is_empty() {
            debug!(craft = %self.id(), %mission, "mission starting");
            self.missions.push_front(mission);
            self.with_front(ctx, |m, craft, ctx| m.start(craft, ctx));
        } else {
            debug!(craft = %self.id(), %mission, "mission queued");
            self.missions.push_back(mission);
        }
        Ok(())
    }

    /// Replaces the queue with `mission`.
    ///
    /// Take-off and landing in progress survive unless `mission` is a crash.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::Blocked`] if the craft's state refuses the
    /// replacement; the queue is left untouched in that case.
    pub fn set_mission(
        &mut self,
        mission: Mission,
        ctx: &mut SimContext<'_>,
    ) -> Result<(), PlacementError> {
        let kind = mission.mission_type();
        let blockers = self.blockers() & kind.set_blockers();
        if !blockers.is_empty() {
            debug!(craft = %self.id(), mission = %kind, ?blockers, "replacement refused");
            return Err(PlacementError::Blocked {
                mission: kind,
                blockers,
            });
        }
        self.clear_missions(kind == MissionType::Crash);
        self.add_mission(mission, true, ctx)
    }

    /// Empties the queue. Unless `forced`, take-off and landing are kept.
    /// Returns `true` if the queue ended up empty.
    pub fn clear_missions(&mut self, forced: bool) -> bool {
        if forced {
            self.missions.clear();
        } else {
            self.missions.retain(|m| m.mission_type().is_committed());
        }
        self.missions.is_empty()
    }

    /// Cancels the mission at `index`. It is popped at the next finish check.
    pub fn cancel_mission(&mut self, index: usize) -> bool {
        match self.missions.get_mut(index) {
            Some(mission) => {
                mission.cancel();
                true
            }
            None => false,
        }
    }

    /// Pops finished missions off the front, starting each newly exposed
    /// one. Returns `true` if anything was popped.
    pub fn pop_finished_missions(&mut self, ctx: &mut SimContext<'_>) -> bool {
        let mut popped = false;
        while self.is_alive() {
            let finished = match self.missions.front() {
                Some(front) => front.is_finished(self, ctx),
                None => break,
            };
            if !finished {
                break;
            }
            let Some(done) = self.missions.pop_front() else {
                break;
            };
            let id = self.id();
            debug!(craft = %id, mission = %done, "mission finished");
            popped = true;

            let Some(next) = self.missions.front_mut() else {
                debug!(craft = %id, "no missions left");
                break;
            };
            if done.mission_type() == MissionType::RestartNextMission {
                next.planned_path.clear();
            }
            debug!(craft = %id, mission = %next, "mission starting");
            self.with_front(ctx, |m, craft, ctx| m.start(craft, ctx));
        }
        popped
    }

    /// Asks the queue for the next goal, popping finished missions along
    /// the way. `None` means the craft has nothing to do.
    pub(crate) fn get_new_goal(&mut self, ctx: &mut SimContext<'_>) -> Option<Goal> {
        self.pop_finished_missions(ctx);
        for _ in 0..GOAL_ROUNDS {
            if !self.is_alive() || self.missions.is_empty() {
                return None;
            }
            let queued = self.missions.len();
            let goal = self
                .with_front(ctx, |m, craft, ctx| m.next_destination(craft, ctx))
                .flatten();
            let grew = self.missions.len() > queued;
            let popped = self.pop_finished_missions(ctx);
            if goal.is_some() {
                return goal;
            }
            if !popped && !grew {
                return None;
            }
        }
        None
    }

    /// Runs `f` on the front mission with the mission temporarily out of
    /// the queue, then places any missions it deferred.
    pub(crate) fn with_front<R>(
        &mut self,
        ctx: &mut SimContext<'_>,
        f: impl FnOnce(&mut Mission, &mut Self, &mut SimContext<'_>) -> R,
    ) -> Option<R> {
        let mut mission = self.missions.pop_front()?;
        let result = f(&mut mission, self, ctx);
        self.missions.push_front(mission);
        self.flush_deferred(ctx);
        Some(result)
    }

    fn flush_deferred(&mut self, ctx: &mut SimContext<'_>) {
        let pending = std::mem::take(&mut self.deferred);
        for (mission, to_back) in pending {
            if let Err(err) = self.add_mission(mission, to_back, ctx) {
                debug!(craft = %self.id(), %err, "deferred mission dropped");
            }
        }
    }
}
