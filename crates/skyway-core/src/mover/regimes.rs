//! Regimes shared by every engine: falling, sliding, wrecked and carried.
//!
//! Falling and sliding are integrated one tick at a time so that a fast
//! craft cannot skip over a tile it should have hit.

use glam::{IVec3, Vec3};
use rand::Rng;
use tracing::debug;

use crate::config::MoverConfig;
use crate::craft::{wrap_angle, Craft, Regime};
use crate::entity::{CraftClass, CraftId};
use crate::event::CraftEvent;
use crate::terrain::{tile_centre, tile_of, Scenery, WalkMode};
use crate::world_view::SimContext;

// =============================================================================
// Falling
// =============================================================================

/// Ballistic descent until the craft lands, leaves the map or dies.
pub(crate) fn update_falling(craft: &mut Craft, ticks: u32, ctx: &mut SimContext<'_>) {
    let config = ctx.config;
    spin(craft, ticks);
    let tps = config.tps();
    let tall = config.plow.tall_scenery_height;

    for _ in 0..ticks {
        shed_debris(craft, ctx);

        let falling = &config.falling;
        let drag = falling.gravity / falling.horizontal_drag_divisor;
        craft.velocity.z -= falling.gravity;
        craft.velocity.x = reduce_abs(craft.velocity.x, drag);
        craft.velocity.y = reduce_abs(craft.velocity.y, drag);
        let mut next = craft.position + craft.velocity / tps;

        // Dropping out of a tile through "into" scenery lands on it instead.
        if craft.position.z.floor() != next.z.floor()
            && ctx
                .terrain
                .scenery(craft.tile())
                .is_some_and(|s| s.walk_mode == WalkMode::Into)
        {
            next = craft.position;
            next.z = craft.position.z.floor();
        }

        let tile = tile_of(next);
        if !ctx.terrain.is_valid(tile) {
            debug!(craft = %craft.id(), "fell off the map");
            craft.die(None, true, ctx);
            return;
        }

        if let Some(scenery) = ctx.terrain.scenery(tile) {
            let entered = tile != craft.tile();
            let damage = collision_damage(craft, &scenery, config);
            let plowed = should_try_plow(&scenery, next.z, entered, tall)
                && plow_through(craft, tile, &scenery, damage, ctx);
            if !still_falling(craft) {
                return;
            }

            if !plowed && scenery.walk_mode == WalkMode::None && scenery.height >= tall {
                let mut sideways = false;
                if craft.position.x.floor() != next.x.floor() {
                    sideways = true;
                    next.x = craft.position.x;
                    craft.velocity.x = 0.0;
                }
                if craft.position.y.floor() != next.y.floor() {
                    sideways = true;
                    next.y = craft.position.y;
                    craft.velocity.y = 0.0;
                }
                if sideways {
                    if !ctx.one_in(config.collision.evade_one_in) {
                        craft.apply_damage(half(damage), 0, None, ctx);
                        if !still_falling(craft) {
                            return;
                        }
                    }
                    continue;
                }
                next.z = next.z.floor();
            }
        }
        craft.position = next;

        if let Some(scenery) = ctx.terrain.scenery(craft.tile()) {
            if craft.position.z < scenery.resting_z {
                land(craft, &scenery, ctx);
                return;
            }
        }
    }
}

/// Whether falling into `scenery` at height `z` is an attempt to break
/// through it. Fallen debris is never plowed; tall "none" scenery only
/// once, on entering its tile.
fn should_try_plow(scenery: &Scenery, z: f32, entered: bool, tall: i32) -> bool {
    if !scenery.anchored {
        return false;
    }
    match scenery.walk_mode {
        WalkMode::None if scenery.height >= tall => entered,
        _ => z < scenery.resting_z,
    }
}

/// Rolls the plow-through. On success the scenery is damaged ("into") or
/// destroyed (anything else), and "none" scenery hurts the craft.
fn plow_through(
    craft: &mut Craft,
    tile: IVec3,
    scenery: &Scenery,
    damage: f32,
    ctx: &mut SimContext<'_>,
) -> bool {
    let config = ctx.config;
    let plow = &config.plow;
    let speed_mult = if craft.velocity.length() > plow.high_speed_threshold {
        plow.high_speed_multiplier
    } else {
        1.0
    };
    #[allow(clippy::cast_precision_loss)]
    let resistance = scenery.constitution as f32 * plow.constitution_multiplier;
    let odds = plow.flat + speed_mult * craft.stats.effective_weight() * plow.weight_multiplier
        - resistance;
    #[allow(clippy::cast_possible_truncation)]
    let odds = odds as i32;
    if ctx.rng.gen_range(0..100) >= odds {
        return false;
    }

    let destroy = scenery.walk_mode != WalkMode::Into;
    ctx.terrain.damage_scenery(tile, destroy);
    debug!(craft = %craft.id(), ?tile, destroy, "plowed through scenery");
    ctx.emit(CraftEvent::SceneryCollapsed {
        craft: craft.id(),
        tile,
        destroyed: destroy,
    });
    if scenery.walk_mode == WalkMode::None && !ctx.one_in(config.collision.evade_one_in) {
        #[allow(clippy::cast_possible_truncation)]
        craft.apply_damage(damage as i32, 0, None, ctx);
    }
    true
}

/// Touchdown: settle at the resting height, turn the descent into a
/// forward skid and pick the next regime.
///
/// Only a ground craft coming down on surface it can drive on recovers;
/// everything else slides and ends up a wreck.
fn land(craft: &mut Craft, scenery: &Scenery, ctx: &mut SimContext<'_>) {
    let config = ctx.config;
    if !ctx.one_in(config.collision.evade_one_in) {
        let damage = collision_damage(craft, scenery, config);
        craft.apply_damage(half(damage), 0, None, ctx);
        if !still_falling(craft) {
            return;
        }
    }

    let rest = tile_centre(craft.tile(), scenery.resting_z);
    craft.goal_waypoints.push_back(rest);
    craft.position.z = rest.z;
    let skid = craft.velocity.truncate();
    if let Some(direction) = skid.try_normalize() {
        let nudge = direction * craft.velocity.z / 3.0;
        craft.velocity.x -= nudge.x;
        craft.velocity.y -= nudge.y;
    }
    craft.velocity.z = 0.0;
    craft.goal_position = craft.position;
    craft.angular_velocity /= 2.0;

    let drivable = craft.class().is_ground()
        && scenery.walk_mode != WalkMode::None
        && (craft.class() != CraftClass::Road || scenery.road);
    if drivable {
        craft.regime = Regime::Controlled;
        craft.velocity = Vec3::ZERO;
        craft.angular_velocity = 0.0;
        debug!(craft = %craft.id(), "landed on its wheels");
    } else {
        craft.regime = Regime::Sliding;
        craft.goal_waypoints.clear();
        debug!(craft = %craft.id(), "touched down, sliding");
    }
}

// =============================================================================
// Sliding
// =============================================================================

/// Skids to a halt and wrecks, unless the craft slides off its support.
pub(crate) fn update_sliding(craft: &mut Craft, ticks: u32, ctx: &mut SimContext<'_>) {
    let config = ctx.config;
    let Some(support) = ctx.terrain.scenery(craft.tile()) else {
        debug!(craft = %craft.id(), "slid off its support");
        craft.start_falling(None, ctx);
        return;
    };
    spin(craft, ticks);
    let tps = config.tps();

    for _ in 0..ticks {
        shed_debris(craft, ctx);

        let deceleration = config.falling.sliding_deceleration;
        craft.velocity.x = reduce_abs(craft.velocity.x, deceleration);
        craft.velocity.y = reduce_abs(craft.velocity.y, deceleration);
        if craft.velocity.x == 0.0 && craft.velocity.y == 0.0 {
            craft.angular_velocity = 0.0;
            craft.crash(None, ctx);
            return;
        }

        let next = craft.position + craft.velocity / tps;
        let tile = tile_of(next);
        if !ctx.terrain.is_valid(tile) {
            debug!(craft = %craft.id(), "slid off the map");
            craft.die(None, true, ctx);
            return;
        }

        if tile != craft.tile() {
            let Some(ahead) = ctx.terrain.scenery(tile) else {
                craft.position = next;
                craft.start_falling(None, ctx);
                return;
            };
            let here = ctx
                .terrain
                .scenery(craft.tile())
                .map_or(support.walk_mode, |s| s.walk_mode);
            let blocked = match here {
                WalkMode::Into => ahead.walk_mode != WalkMode::Into,
                WalkMode::Onto | WalkMode::None => {
                    let drop = next.z - next.z.floor();
                    if ahead.walk_mode == WalkMode::Into
                        && drop > config.falling.slide_drop_height
                    {
                        craft.position = next;
                        craft.start_falling(None, ctx);
                        return;
                    }
                    let above = tile + IVec3::Z;
                    ctx.terrain.is_valid(above) && ctx.terrain.scenery(above).is_some()
                }
            };
            if blocked {
                // Wrecks on the next tick.
                craft.velocity = Vec3::ZERO;
                continue;
            }
        }
        craft.position = next;
    }
}

// =============================================================================
// Wrecked and carried
// =============================================================================

/// A wreck whose support has gone falls again; a UFO wreck is destroyed.
pub(crate) fn update_crashed(craft: &mut Craft, ctx: &mut SimContext<'_>) {
    if ctx.terrain.scenery(craft.tile()).is_some() {
        return;
    }
    if craft.class() == CraftClass::Ufo {
        craft.die(None, false, ctx);
    } else {
        ctx.emit(CraftEvent::SmokeCleared { craft: craft.id() });
        craft.start_falling(None, ctx);
    }
}

/// Hangs below the carrier. A carrier that is gone drops the craft.
pub(crate) fn update_carried(craft: &mut Craft, carrier: CraftId, ctx: &mut SimContext<'_>) {
    let config = ctx.config;
    let Some(snapshot) = ctx.view.craft(carrier) else {
        debug!(craft = %craft.id(), %carrier, "carrier lost");
        craft.carried_by = None;
        craft.start_falling(None, ctx);
        return;
    };
    let mut position = snapshot.position;
    position.z = (position.z - config.falling.carried_offset).max(0.0);
    craft.position = position;
    craft.goal_position = position;
    craft.facing = snapshot.facing;
    craft.goal_facing = snapshot.facing;
}

// =============================================================================
// Helpers
// =============================================================================

fn still_falling(craft: &Craft) -> bool {
    craft.is_alive() && craft.regime == Regime::Falling
}

fn spin(craft: &mut Craft, ticks: u32) {
    if craft.angular_velocity != 0.0 {
        #[allow(clippy::cast_precision_loss)]
        let swept = craft.angular_velocity * ticks as f32;
        craft.facing = wrap_angle(craft.facing + swept);
    }
}

/// Moves `value` towards zero by `by`, stopping at zero.
fn reduce_abs(value: f32, by: f32) -> f32 {
    if value > by {
        value - by
    } else if value < -by {
        value + by
    } else {
        0.0
    }
}

/// Damage from hitting `scenery`: a share of the craft's health, or more
/// against sturdy scenery up to a cap.
fn collision_damage(craft: &Craft, scenery: &Scenery, config: &MoverConfig) -> f32 {
    let collision = &config.collision;
    #[allow(clippy::cast_precision_loss)]
    let floor = craft.stats.max_health as f32 * collision.min_fraction;
    #[allow(clippy::cast_precision_loss)]
    let sturdiness = scenery.constitution as f32 * collision.constitution_multiplier;
    floor.max(sturdiness.min(collision.limit))
}

#[allow(clippy::cast_possible_truncation)]
fn half(damage: f32) -> i32 {
    (damage / 2.0) as i32
}

/// Badly damaged craft occasionally shed burning debris.
fn shed_debris(craft: &Craft, ctx: &mut SimContext<'_>) {
    let config = ctx.config;
    if craft.health <= 0 {
        return;
    }
    let falling = &config.falling;
    if craft.stats.max_health / craft.health < falling.debris_health_ratio {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    let chance = falling.debris_chance_percent as f32;
    if !ctx.roll_percent(chance) {
        return;
    }
    let offset = Vec3::new(
        jitter(&mut *ctx.rng),
        jitter(&mut *ctx.rng),
        jitter(&mut *ctx.rng),
    );
    ctx.emit(CraftEvent::DebrisDoodad {
        craft: craft.id(),
        position: craft.position + offset,
    });
}

/// A random offset of up to three tenths of a tile.
fn jitter(rng: &mut impl Rng) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let step = rng.gen_range(-3..=3) as f32;
    step / 10.0
}
