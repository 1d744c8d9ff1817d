// Core types shared across the map core.
//
// Defines tile addressing (`TilePos`, `RelativePoint`), object references
// (`ObjectId`, `ObjectRef`), and the small closed enums the map objects are
// parameterized by (materials, landscape, resources, search types). All types
// derive `Serialize` and `Deserialize` for save/load and lockstep snapshots.
//
// The grid is hexagonal in the jsettlers sense: axial coordinates where the
// six neighbours are the offsets in `HEX_NEIGHBOURS`.
//
// **Critical constraint: determinism.** Object IDs are sequential counters
// owned by the objects manager, so every peer issues the same IDs for the
// same command stream.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A tile position on the map grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Position shifted by a raw offset.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Number of steps between two tiles on the hex grid.
    pub fn hex_distance(self, other: Self) -> u32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        if (dx >= 0) == (dy >= 0) {
            dx.unsigned_abs().max(dy.unsigned_abs())
        } else {
            dx.unsigned_abs() + dy.unsigned_abs()
        }
    }

    /// The in-or-out-of-bounds neighbours of this tile, in direction order.
    pub fn hex_neighbours(self) -> impl Iterator<Item = TilePos> {
        HEX_NEIGHBOURS
            .iter()
            .map(move |&(dx, dy)| self.offset(dx, dy))
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Neighbour offsets: north-east, east, south-east, south-west, west,
/// north-west.
pub const HEX_NEIGHBOURS: [(i32, i32); 6] = [(0, -1), (1, 0), (1, 1), (0, 1), (-1, 0), (-1, -1)];

/// An offset from an object's anchor tile. Footprints are slices of these.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelativePoint {
    pub dx: i16,
    pub dy: i16,
}

impl RelativePoint {
    pub const fn new(dx: i16, dy: i16) -> Self {
        Self { dx, dy }
    }

    /// Absolute tile this offset lands on for the given anchor.
    pub const fn calculate(self, anchor: TilePos) -> TilePos {
        anchor.offset(self.dx as i32, self.dy as i32)
    }
}

// ---------------------------------------------------------------------------
// Object identity
// ---------------------------------------------------------------------------

/// Identifier of a map object, unique for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a scheduled event finds its target: the anchor tile whose chain
/// holds the object, plus the object's ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub anchor: TilePos,
    pub id: ObjectId,
}

/// Owning player slot of an object. `None` on the object means neutral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

// ---------------------------------------------------------------------------
// Gameplay enums
// ---------------------------------------------------------------------------

/// Materials that can lie in stack piles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialType {
    Plank,
    Stone,
    Trunk,
    Crop,
    Flour,
    Bread,
    Pig,
    Meat,
    Fish,
    Water,
    Coal,
    IronOre,
    Iron,
    GoldOre,
    Gold,
    Sword,
    Bow,
    Spear,
    Axe,
    Pickaxe,
    Saw,
    Hammer,
    Scythe,
    FishingRod,
    Blade,
    Wine,
}

/// Ground type of a tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LandscapeType {
    #[default]
    Grass,
    Earth,
    Sand,
    Desert,
    Mountain,
    Snow,
    Water,
    River,
    Moor,
}

/// Underground resource of a tile, shown by resource signs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    #[default]
    Nothing,
    Coal,
    Iron,
    Gold,
    Gemstone,
    Brimstone,
    Fish,
}

/// What a worker found at the end of a search, and thus what the objects
/// manager should do at the found tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchType {
    CuttableTree,
    CuttableStone,
    PlantableTree,
    CuttableCorn,
    PlantableCorn,
    ResourceSignable,
}
