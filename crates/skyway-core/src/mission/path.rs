//! Tile path search and path following.

use glam::{IVec3, Vec3};
use pathfinding::prelude::{astar, build_path, dijkstra_partial};
use tracing::debug;

use crate::entity::CraftClass;
use crate::terrain::{tile_centre, EnterQuery, Terrain};

/// Integer path costs are distances scaled by this.
const COST_SCALE: f32 = 100.0;

/// A path found by [`find_path`], starting with the origin tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FoundPath {
    pub tiles: Vec<IVec3>,
    pub picked_nearest: bool,
}

fn neighbours(class: CraftClass) -> impl Iterator<Item = IVec3> {
    let ground = class.is_ground();
    (-1..=1).flat_map(move |x| {
        (-1..=1).flat_map(move |y| {
            (-1..=1).filter_map(move |z| {
                let step = IVec3::new(x, y, z);
                let keep = if ground {
                    x != 0 || y != 0
                } else {
                    step != IVec3::ZERO
                };
                keep.then_some(step)
            })
        })
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled(value: f32) -> u32 {
    (value * COST_SCALE).round().max(0.0) as u32
}

/// Rounds down so the straight-line estimate never exceeds the summed step
/// costs.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_scaled(value: f32) -> u32 {
    (value * COST_SCALE).floor().max(0.0) as u32
}

fn successors<'t>(
    terrain: &'t dyn Terrain,
    class: CraftClass,
    mut budget: usize,
) -> impl FnMut(&IVec3) -> Vec<(IVec3, u32)> + 't {
    move |tile: &IVec3| {
        if budget == 0 {
            return Vec::new();
        }
        budget -= 1;
        let from = *tile;
        neighbours(class)
            .map(|step| from + step)
            .filter(|next| terrain.can_enter(class, Some(from), *next, EnterQuery::default()))
            .map(|next| {
                let step = terrain.distance(from.as_vec3(), next.as_vec3())
                    + terrain.cost(class, next, next.z);
                (next, scaled(step).max(1))
            })
            .collect()
    }
}

/// Searches a path from `from` to `to` expanding at most `max_iterations`
/// tiles. With `pick_nearest`, an unreachable target yields the path to the
/// explored tile closest to it.
pub(crate) fn find_path(
    terrain: &dyn Terrain,
    class: CraftClass,
    from: IVec3,
    to: IVec3,
    max_iterations: usize,
    pick_nearest: bool,
) -> Option<FoundPath> {
    if from == to {
        return Some(FoundPath {
            tiles: vec![from],
            picked_nearest: false,
        });
    }
    let target = to.as_vec3();
    let found = astar(
        &from,
        successors(terrain, class, max_iterations),
        |tile| floor_scaled(terrain.distance(tile.as_vec3(), target)),
        |tile| *tile == to,
    );
    if let Some((tiles, _)) = found {
        return Some(FoundPath {
            tiles,
            picked_nearest: false,
        });
    }
    if !pick_nearest {
        debug!(?from, ?to, "no path");
        return None;
    }

    let (parents, _) = dijkstra_partial(
        &from,
        successors(terrain, class, max_iterations),
        |tile| *tile == to,
    );
    let nearest = parents
        .keys()
        .copied()
        .chain(std::iter::once(from))
        .min_by_key(|tile| {
            let d = *tile - to;
            (d.length_squared(), tile.x, tile.y, tile.z)
        })?;
    let tiles = if nearest == from {
        vec![from]
    } else {
        build_path(&nearest, &parents)
    };
    debug!(?from, ?to, ?nearest, "settled for nearest reachable tile");
    Some(FoundPath {
        tiles,
        picked_nearest: true,
    })
}

/// World position a craft of `class` should aim for inside `tile`.
pub(crate) fn destination(terrain: &dyn Terrain, class: CraftClass, tile: IVec3) -> Vec3 {
    #[allow(clippy::cast_precision_loss)]
    let base = tile.z as f32;
    let z = if class.is_ground() {
        terrain.scenery(tile).map_or(base, |s| s.resting_z)
    } else {
        base + 0.5
    };
    tile_centre(tile, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{GridTerrain, Scenery};

    fn open_sky() -> GridTerrain {
        GridTerrain::new(IVec3::new(12, 12, 8))
    }

    #[test]
    fn neighbourhood_sizes() {
        assert_eq!(neighbours(CraftClass::Flying).count(), 26);
        assert_eq!(neighbours(CraftClass::Road).count(), 24);
    }

    #[test]
    fn straight_flight() {
        let map = open_sky();
        let path = find_path(
            &map,
            CraftClass::Flying,
            IVec3::new(1, 1, 4),
            IVec3::new(5, 1, 4),
            1000,
            false,
        )
        .unwrap();
        assert_eq!(path.tiles.first(), Some(&IVec3::new(1, 1, 4)));
        assert_eq!(path.tiles.last(), Some(&IVec3::new(5, 1, 4)));
        assert_eq!(path.tiles.len(), 5);
        assert!(!path.picked_nearest);
    }

    #[test]
    fn walled_target_picks_nearest() {
        let mut map = open_sky();
        let goal = IVec3::new(6, 6, 4);
        for step in neighbours(CraftClass::Flying) {
            map.set(goal + step, Scenery::tower((goal + step).z));
        }
        assert!(find_path(&map, CraftClass::Flying, IVec3::new(1, 1, 4), goal, 5000, false)
            .is_none());

        let path =
            find_path(&map, CraftClass::Flying, IVec3::new(1, 1, 4), goal, 5000, true).unwrap();
        assert!(path.picked_nearest);
        let end = *path.tiles.last().unwrap();
        assert_ne!(end, goal);
        assert!((end - goal).length_squared() <= 8);
    }

    #[test]
    fn iteration_budget_limits_search() {
        let map = open_sky();
        assert!(find_path(
            &map,
            CraftClass::Flying,
            IVec3::new(0, 0, 0),
            IVec3::new(11, 11, 7),
            2,
            false
        )
        .is_none());
    }

    #[test]
    fn ground_paths_follow_roads() {
        let mut map = GridTerrain::new(IVec3::new(8, 8, 4));
        for x in 0..6 {
            map.set(IVec3::new(x, 2, 1), Scenery::road(1));
        }
        let path = find_path(
            &map,
            CraftClass::Road,
            IVec3::new(0, 2, 1),
            IVec3::new(5, 2, 1),
            1000,
            false,
        )
        .unwrap();
        assert!(path.tiles.iter().all(|t| t.y == 2 && t.z == 1));
    }

    #[test]
    fn destinations_by_class() {
        let mut map = open_sky();
        map.set(IVec3::new(2, 2, 1), Scenery::ramp(1));
        assert_eq!(
            destination(&map, CraftClass::Atv, IVec3::new(2, 2, 1)),
            Vec3::new(2.5, 2.5, 1.5)
        );
        assert_eq!(
            destination(&map, CraftClass::Flying, IVec3::new(3, 3, 4)),
            Vec3::new(3.5, 3.5, 4.5)
        );
    }
}
