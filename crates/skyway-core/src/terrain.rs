//! Terrain query interface.
//!
//! The tile map, its scenery and the path-cost rules belong to an outer
//! layer. The mover only needs the questions in [`Terrain`]: can a craft
//! enter a tile, what obstructs a tile, how does that obstruction behave
//! when something lands on or falls through it.
//!
//! [`GridTerrain`] is a plain in-memory implementation, enough for tools,
//! benchmarks and tests.
//!
//! # Coordinates
//!
//! Tiles are addressed by integer `(x, y, z)`. A world position belongs to
//! the tile its components floor to (see [`tile_of`]). Resting heights are
//! absolute world `z` values.

use std::collections::HashMap;

use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::entity::CraftClass;

/// Collision behaviour of an obstruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalkMode {
    /// Craft settle inside the tile (roads, ramps, rubble).
    Into,
    /// Craft settle on top of it (roofs, blocks).
    Onto,
    /// Nothing settles here; tall pieces stop sideways motion.
    None,
}

/// Obstructing terrain in one tile.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenery {
    /// Collision classification.
    pub walk_mode: WalkMode,
    /// Absolute `z` at which a craft rests in this tile.
    pub resting_z: f32,
    /// Resistance to being plowed through.
    pub constitution: i32,
    /// Height in voxels (16 per tier).
    pub height: i32,
    /// Part of the road network.
    pub road: bool,
    /// Part of the original map rather than fallen debris. Only anchored
    /// scenery can be plowed through.
    pub anchored: bool,
}

impl Scenery {
    /// Flat road surface in tier `z`.
    #[must_use]
    pub fn road(z: i32) -> Self {
        Self {
            walk_mode: WalkMode::Into,
            resting_z: tier(z) + resting_fraction(2),
            constitution: 20,
            height: 2,
            road: true,
            anchored: true,
        }
    }

    /// Flat off-road surface in tier `z`.
    #[must_use]
    pub fn ground(z: i32) -> Self {
        Self {
            road: false,
            ..Self::road(z)
        }
    }

    /// Road ramp in tier `z`, resting half way up the tier.
    #[must_use]
    pub fn ramp(z: i32) -> Self {
        Self {
            resting_z: tier(z) + resting_fraction(8),
            height: 8,
            ..Self::road(z)
        }
    }

    /// Solid block in tier `z` that craft land on top of.
    #[must_use]
    pub fn block(z: i32, height: i32) -> Self {
        Self {
            walk_mode: WalkMode::Onto,
            resting_z: tier(z) + resting_fraction(height),
            constitution: 20,
            height,
            road: false,
            anchored: true,
        }
    }

    /// Tall structure in tier `z` that nothing rests on.
    #[must_use]
    pub fn tower(z: i32) -> Self {
        Self {
            walk_mode: WalkMode::None,
            ..Self::block(z, 16)
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn tier(z: i32) -> f32 {
    z as f32
}

#[allow(clippy::cast_precision_loss)]
fn resting_fraction(height: i32) -> f32 {
    height.clamp(0, 15) as f32 / 16.0
}

/// Unit-collision switches for [`Terrain::can_enter`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct EnterQuery {
    /// Pass through parked craft.
    pub ignore_static_units: bool,
    /// Pass through moving craft.
    pub ignore_moving_units: bool,
    /// Pass through all craft.
    pub ignore_all_units: bool,
}

impl Default for EnterQuery {
    fn default() -> Self {
        Self {
            ignore_static_units: false,
            ignore_moving_units: true,
            ignore_all_units: false,
        }
    }
}

/// Tile-map questions asked by the mover and missions.
pub trait Terrain {
    /// Map extent in tiles.
    fn size(&self) -> IVec3;

    /// Whether `tile` lies inside the simulated area.
    fn is_valid(&self, tile: IVec3) -> bool {
        let size = self.size();
        tile.cmpge(IVec3::ZERO).all() && tile.cmplt(size).all()
    }

    /// Obstructing terrain in `tile`, if any.
    fn scenery(&self, tile: IVec3) -> Option<Scenery>;

    /// Whether a craft of `class` may move from `from` into `to`.
    ///
    /// `from` is `None` when the craft is being placed on the map.
    fn can_enter(&self, class: CraftClass, from: Option<IVec3>, to: IVec3, query: EnterQuery)
        -> bool;

    /// Path cost adjustment for stepping into `next` at tier `z`.
    fn cost(&self, _class: CraftClass, _next: IVec3, _z: i32) -> f32 {
        0.0
    }

    /// Travel distance between two points.
    fn distance(&self, from: Vec3, to: Vec3) -> f32 {
        from.distance(to)
    }

    /// Distance from `from` to the segment `start..end`.
    fn distance_to_segment(&self, from: Vec3, start: Vec3, end: Vec3) -> f32 {
        let seg = end - start;
        let len_sq = seg.length_squared();
        if len_sq == 0.0 {
            return self.distance(from, start);
        }
        let t = ((from - start).dot(seg) / len_sq).clamp(0.0, 1.0);
        self.distance(from, start + seg * t)
    }

    /// Applies a plow-through to the scenery in `tile`. `destroy` removes it
    /// outright; otherwise it is left damaged in place.
    fn damage_scenery(&mut self, tile: IVec3, destroy: bool);
}

/// Tile containing a world position.
#[must_use]
pub fn tile_of(position: Vec3) -> IVec3 {
    position.floor().as_ivec3()
}

/// Centre of a tile at a given absolute height.
#[must_use]
pub fn tile_centre(tile: IVec3, z: f32) -> Vec3 {
    let base = tile.as_vec3();
    Vec3::new(base.x + 0.5, base.y + 0.5, z)
}

/// In-memory tile grid.
///
/// Flying craft may enter any tile without scenery. Ground craft may enter
/// tiles holding `Into` scenery (roads only for [`CraftClass::Road`]) no
/// more than one tier away.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridTerrain {
    size: IVec3,
    scenery: HashMap<IVec3, Scenery>,
}

impl GridTerrain {
    /// Creates an empty map of the given extent.
    #[must_use]
    pub fn new(size: IVec3) -> Self {
        Self {
            size,
            scenery: HashMap::new(),
        }
    }

    /// Places (or replaces) scenery in a tile.
    pub fn set(&mut self, tile: IVec3, scenery: Scenery) {
        self.scenery.insert(tile, scenery);
    }

    /// Removes scenery from a tile.
    pub fn clear(&mut self, tile: IVec3) {
        self.scenery.remove(&tile);
    }

    /// Fills tier `z` with scenery produced by `make`.
    pub fn fill_layer(&mut self, z: i32, make: impl Fn(i32) -> Scenery) {
        for x in 0..self.size.x {
            for y in 0..self.size.y {
                self.scenery.insert(IVec3::new(x, y, z), make(z));
            }
        }
    }
}

impl Terrain for GridTerrain {
    fn size(&self) -> IVec3 {
        self.size
    }

    fn scenery(&self, tile: IVec3) -> Option<Scenery> {
        self.scenery.get(&tile).copied()
    }

    fn can_enter(
        &self,
        class: CraftClass,
        from: Option<IVec3>,
        to: IVec3,
        _query: EnterQuery,
    ) -> bool {
        if !self.is_valid(to) || from.is_some_and(|f| !self.is_valid(f)) {
            return false;
        }
        let scenery = self.scenery(to);
        if !class.is_ground() {
            return scenery.is_none();
        }
        if from.is_some_and(|f| (f.z - to.z).abs() > 1) {
            return false;
        }
        match scenery {
            Some(s) if s.walk_mode == WalkMode::Into => class != CraftClass::Road || s.road,
            _ => false,
        }
    }

    fn damage_scenery(&mut self, tile: IVec3, destroy: bool) {
        if destroy {
            self.scenery.remove(&tile);
        } else if let Some(s) = self.scenery.get_mut(&tile) {
            s.constitution /= 2;
            s.anchored = false;
        }
    }
}
