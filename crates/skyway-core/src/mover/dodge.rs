//! Incoming-projectile dodge.
//!
//! When idle, a flying craft may look for a projectile whose next second of
//! flight passes within its hit radius. If one is found the craft sidesteps
//! into a neighbouring tile: horizontally away from the projectile's line
//! at a steep enough angle, and/or one tier up or down, choosing at random
//! among the enterable candidates.

use glam::{IVec3, Vec2, Vec3};
use rand::seq::SliceRandom;
use tracing::debug;

use crate::craft::Craft;
use crate::mission::Mission;
use crate::terrain::EnterQuery;
use crate::world_view::{Projectile, SimContext};

/// Tries to dodge the first threatening projectile. Returns `true` if an
/// evasive move was queued.
pub(crate) fn try_dodge(craft: &mut Craft, ctx: &mut SimContext<'_>) -> bool {
    #[allow(clippy::cast_precision_loss)]
    let chance = ctx.config.dodge.chance_percent as f32;
    if !ctx.roll_percent(chance) {
        return false;
    }
    let here = craft.tile();
    for projectile in ctx.view.projectiles() {
        let Some(side) = threat_side(craft, projectile, ctx) else {
            continue;
        };
        let candidates: Vec<IVec3> = candidate_tiles(here, side, ctx)
            .into_iter()
            .filter(|tile| {
                ctx.terrain.is_valid(*tile)
                    && ctx
                        .terrain
                        .can_enter(craft.class(), Some(here), *tile, EnterQuery::default())
            })
            .collect();
        let Some(&target) = candidates.choose(&mut *ctx.rng) else {
            continue;
        };
        if let Some(front) = craft.missions.front_mut() {
            front.planned_path.clear();
        }
        let mission = Mission::goto_location(target, ctx.config).with_planned_path([here, target]);
        if craft.add_mission(mission, false, ctx).is_ok() {
            debug!(craft = %craft.id(), ?target, "dodging projectile");
            return true;
        }
        return false;
    }
    false
}

/// Which ways the craft may dodge a projectile that will hit it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ThreatSide {
    /// Horizontal direction from the projectile to the craft, if it has
    /// one.
    bearing: Option<Vec2>,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
}

/// Checks whether `projectile` threatens the craft within the next second
/// and, if so, which sides are open for a dodge.
fn threat_side(craft: &Craft, projectile: &Projectile, ctx: &SimContext<'_>) -> Option<ThreatSide> {
    let dodge = &ctx.config.dodge;
    if projectile.firer == Some(craft.id()) && projectile.age < dodge.own_projectile_grace_ticks {
        return None;
    }
    let point = craft.position - projectile.position;
    let remaining = projectile
        .lifetime
        .saturating_sub(projectile.age)
        .min(ctx.config.ticks_per_second);
    #[allow(clippy::cast_precision_loss)]
    let line = projectile.velocity * remaining as f32 / ctx.config.tps();
    let line_dir = line.try_normalize()?;
    let point_dir = point.try_normalize()?;

    let angle = unsigned_angle(line_dir, point_dir);
    let along = point.length() * angle.cos();
    let hit_point = if angle > std::f32::consts::FRAC_PI_2 {
        Vec3::ZERO
    } else if along > line.length() {
        line
    } else {
        line_dir * along
    };
    if (point - hit_point).length() > craft.stats.hit_radius() {
        return None;
    }

    let offset = relative_offset(hit_point - point, point_dir);
    let tolerance = dodge.centre_tolerance;
    Some(ThreatSide {
        bearing: point.truncate().try_normalize(),
        left: offset.x > -tolerance,
        right: offset.x < tolerance,
        down: offset.z > -tolerance,
        up: offset.z < tolerance,
    })
}

/// Expresses `v` in a frame whose `y` axis points from the projectile to
/// the craft.
fn relative_offset(v: Vec3, point_dir: Vec3) -> Vec3 {
    if point_dir.x == 0.0 && point_dir.z == 0.0 {
        return if point_dir.y < 0.0 {
            Vec3::new(-v.x, -v.y, v.z)
        } else {
            v
        };
    }
    let axis_y = point_dir;
    let axis_z = axis_y.cross(Vec3::Y).normalize();
    let axis_x = axis_y.cross(axis_z).normalize();
    Vec3::new(v.dot(axis_x), v.dot(axis_y), v.dot(axis_z))
}

/// Neighbouring tiles that move the craft out of the projectile's way.
fn candidate_tiles(here: IVec3, side: ThreatSide, ctx: &SimContext<'_>) -> Vec<IVec3> {
    let dodge = &ctx.config.dodge;
    let mut tiles = Vec::new();
    for x in -1..=1 {
        for y in -1..=1 {
            if x != 0 || y != 0 {
                let Some(bearing) = side.bearing else {
                    continue;
                };
                #[allow(clippy::cast_precision_loss)]
                let step = Vec2::new(x as f32, y as f32).normalize();
                let right = bearing.perp_dot(step) < 0.0;
                if (right && !side.right) || (!right && !side.left) {
                    continue;
                }
                let angle = unsigned_angle_2d(bearing, step);
                if angle < dodge.min_angle || angle > dodge.max_angle {
                    continue;
                }
                tiles.push(here + IVec3::new(x, y, 0));
            }
            if side.up {
                tiles.push(here + IVec3::new(x, y, 1));
            }
            if side.down {
                tiles.push(here + IVec3::new(x, y, -1));
            }
        }
    }
    tiles
}

fn unsigned_angle(a: Vec3, b: Vec3) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

fn unsigned_angle_2d(a: Vec2, b: Vec2) -> f32 {
    a.dot(b).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Terrain;
    use crate::tests::helpers::Harness;

    fn incoming(at: Vec3, towards: Vec3) -> Projectile {
        Projectile::new(at, (towards - at).normalize() * 20.0, 200)
    }

    #[test]
    fn frame_special_case_on_y_axis() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(relative_offset(v, Vec3::Y), v);
        assert_eq!(relative_offset(v, -Vec3::Y), Vec3::new(-1.0, -2.0, 3.0));
    }

    #[test]
    fn frame_y_axis_follows_point() {
        let v = Vec3::new(0.0, 0.0, 1.0);
        let rel = relative_offset(v, Vec3::X);
        assert!(rel.y.abs() < 1e-6);
        assert!((rel.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn passing_projectile_is_ignored() {
        let mut h = Harness::open_sky();
        let craft = h.detached_flyer(Vec3::new(5.5, 5.5, 5.5));
        let wide = incoming(Vec3::new(0.5, 0.5, 5.5), Vec3::new(10.5, 0.5, 5.5));
        h.with_context(|ctx| assert!(threat_side(&craft, &wide, ctx).is_none()));
    }

    #[test]
    fn own_fresh_projectile_is_ignored() {
        let mut h = Harness::open_sky();
        let craft = h.detached_flyer(Vec3::new(5.5, 5.5, 5.5));
        let mut shot = incoming(Vec3::new(2.5, 5.5, 5.5), craft.position);
        shot.firer = Some(craft.id());
        h.with_context(|ctx| assert!(threat_side(&craft, &shot, ctx).is_none()));
        shot.age = 40;
        h.with_context(|ctx| assert!(threat_side(&craft, &shot, ctx).is_some()));
    }

    #[test]
    fn head_on_projectile_opens_all_sides() {
        let mut h = Harness::open_sky();
        let craft = h.detached_flyer(Vec3::new(5.5, 5.5, 5.5));
        let shot = incoming(Vec3::new(2.5, 5.5, 5.5), craft.position);
        h.with_context(|ctx| {
            let side = threat_side(&craft, &shot, ctx).unwrap();
            assert!(side.left && side.right && side.up && side.down);
            let tiles = candidate_tiles(craft.tile(), side, ctx);
            assert!(tiles.iter().all(|t| (*t - craft.tile()).abs().max_element() == 1));
            // Sidesteps perpendicular to the line are in the window; straight
            // back along it is not.
            assert!(tiles.contains(&IVec3::new(5, 4, 5)));
            assert!(!tiles.contains(&IVec3::new(6, 5, 5)));
        });
    }

    #[test]
    fn dodge_picks_enterable_tile() {
        let mut h = Harness::eager_dodgers();
        let id = h.spawn_flyer(Vec3::new(5.5, 5.5, 5.5));
        for step in [IVec3::new(0, -1, 0), IVec3::new(0, 1, 0), IVec3::new(0, 0, 1)] {
            h.block(IVec3::new(5, 5, 5) + step);
        }
        h.add_projectile(incoming(Vec3::new(2.5, 5.5, 5.5), Vec3::new(5.5, 5.5, 5.5)));
        h.update(1);
        let front = h.craft(id).front_mission().expect("dodge queued");
        let target = *front.planned_path().back().unwrap();
        assert!(h.terrain().can_enter(
            crate::entity::CraftClass::Flying,
            Some(IVec3::new(5, 5, 5)),
            target,
            EnterQuery::default()
        ));
    }
}
