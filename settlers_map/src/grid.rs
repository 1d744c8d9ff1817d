// The grid capability the map core runs against, and a dense implementation.
//
// `MapObjectsGrid` is the seam between the map core and whatever owns the
// real map: bounds, the per-tile object chain, blocked/protected flags,
// landscape, and underground resources. Everything in `placement.rs`,
// `stack.rs`, and `objects_manager.rs` is generic over it.
//
// Each tile's object chain is an ordered `Vec<MapObject>`: insertion order is
// chain order, and "the object of kind K at this tile" is the first one in
// that order. Out-of-bounds reads return the neutral value (empty chain, not
// blocked, `Grass`, `Nothing`); out-of-bounds writes are no-ops.
//
// `TileGrid` is the dense implementation used by `SimState`. Tiles are stored
// flat, indexed by `x + y * width`. Unlike a voxel world it cannot be
// regenerated from a seed (objects and landscape change during play), so it
// is serialized as part of the sim snapshot.
//
// **Critical constraint: determinism.** Chain order is part of the game
// state: wildcard pops and kind lookups take the first match. Never reorder a
// chain except by removing from it.

use crate::map_object::{MapObject, MapObjectKind};
use crate::types::{LandscapeType, ObjectId, ResourceType, TilePos};
use serde::{Deserialize, Serialize};

/// Grid operations the map core needs.
pub trait MapObjectsGrid {
    fn width(&self) -> u16;
    fn height(&self) -> u16;

    fn is_in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.x < i32::from(self.width())
            && pos.y < i32::from(self.height())
    }

    /// The tile's object chain, in insertion order.
    fn objects_at(&self, pos: TilePos) -> &[MapObject];
    fn objects_at_mut(&mut self, pos: TilePos) -> &mut [MapObject];

    /// Append to the chain at `object.anchor`. No footprint checks; see
    /// `placement::try_place` for that.
    fn add_object(&mut self, object: MapObject);

    /// Unlink the object with `id` from the chain at `pos`.
    fn remove_object(&mut self, pos: TilePos, id: ObjectId) -> Option<MapObject>;

    /// Unlink the first object of `kind` from the chain at `pos`.
    fn remove_object_of_kind(&mut self, pos: TilePos, kind: MapObjectKind) -> Option<MapObject>;

    fn object_of_kind(&self, pos: TilePos, kind: MapObjectKind) -> Option<&MapObject> {
        self.objects_at(pos).iter().find(|o| o.kind() == kind)
    }

    fn object_of_kind_mut(&mut self, pos: TilePos, kind: MapObjectKind) -> Option<&mut MapObject> {
        self.objects_at_mut(pos).iter_mut().find(|o| o.kind() == kind)
    }

    fn object_mut(&mut self, pos: TilePos, id: ObjectId) -> Option<&mut MapObject> {
        self.objects_at_mut(pos).iter_mut().find(|o| o.id == id)
    }

    fn is_blocked(&self, pos: TilePos) -> bool;
    fn set_blocked(&mut self, pos: TilePos, blocked: bool);

    fn is_protected(&self, pos: TilePos) -> bool;
    fn set_protected(&mut self, pos: TilePos, protected: bool);

    fn landscape(&self, pos: TilePos) -> LandscapeType;
    fn set_landscape(&mut self, pos: TilePos, landscape: LandscapeType);

    fn resource_type_at(&self, pos: TilePos) -> ResourceType;
    /// Raw amount in `0..=MAX_RESOURCE_AMOUNT`.
    fn resource_amount_at(&self, pos: TilePos) -> u8;
}

/// Largest per-tile resource amount; resource signs normalize by it.
pub const MAX_RESOURCE_AMOUNT: u8 = i8::MAX as u8;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Tile {
    blocked: bool,
    protected: bool,
    landscape: LandscapeType,
    resource: ResourceType,
    resource_amount: u8,
    objects: Vec<MapObject>,
}

/// Dense tile grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TileGrid {
    width: u16,
    height: u16,
    /// Flat storage: index = x + y * width.
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// An all-grass grid with no objects.
    pub fn new(width: u16, height: u16) -> Self {
        let total = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            tiles: vec![Tile::default(); total],
        }
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        if self.is_in_bounds(pos) {
            Some(pos.x as usize + pos.y as usize * usize::from(self.width))
        } else {
            None
        }
    }

    fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.index(pos).map(|i| &self.tiles[i])
    }

    fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index(pos).map(|i| &mut self.tiles[i])
    }

    /// Seed an underground resource. Amounts above `MAX_RESOURCE_AMOUNT` are
    /// clamped. No-op out of bounds.
    pub fn set_resource(&mut self, pos: TilePos, resource: ResourceType, amount: u8) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.resource = resource;
            tile.resource_amount = amount.min(MAX_RESOURCE_AMOUNT);
        }
    }

    /// Number of blocked tiles. Used by tests and invariant checks.
    pub fn blocked_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.blocked).count()
    }

    /// Every object on the map, tile by tile in index order.
    pub fn all_objects(&self) -> impl Iterator<Item = &MapObject> {
        self.tiles.iter().flat_map(|t| t.objects.iter())
    }
}

impl MapObjectsGrid for TileGrid {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn objects_at(&self, pos: TilePos) -> &[MapObject] {
        match self.tile(pos) {
            Some(tile) => tile.objects.as_slice(),
            None => &[],
        }
    }

    fn objects_at_mut(&mut self, pos: TilePos) -> &mut [MapObject] {
        match self.tile_mut(pos) {
            Some(tile) => tile.objects.as_mut_slice(),
            None => &mut [],
        }
    }

    fn add_object(&mut self, object: MapObject) {
        if let Some(tile) = self.tile_mut(object.anchor) {
            tile.objects.push(object);
        }
    }

    fn remove_object(&mut self, pos: TilePos, id: ObjectId) -> Option<MapObject> {
        let tile = self.tile_mut(pos)?;
        let index = tile.objects.iter().position(|o| o.id == id)?;
        Some(tile.objects.remove(index))
    }

    fn remove_object_of_kind(&mut self, pos: TilePos, kind: MapObjectKind) -> Option<MapObject> {
        let tile = self.tile_mut(pos)?;
        let index = tile.objects.iter().position(|o| o.kind() == kind)?;
        Some(tile.objects.remove(index))
    }

    fn is_blocked(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(|t| t.blocked)
    }

    fn set_blocked(&mut self, pos: TilePos, blocked: bool) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.blocked = blocked;
        }
    }

    fn is_protected(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(|t| t.protected)
    }

    fn set_protected(&mut self, pos: TilePos, protected: bool) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.protected = protected;
        }
    }

    fn landscape(&self, pos: TilePos) -> LandscapeType {
        self.tile(pos).map(|t| t.landscape).unwrap_or_default()
    }

    fn set_landscape(&mut self, pos: TilePos, landscape: LandscapeType) {
        if let Some(tile) = self.tile_mut(pos) {
            tile.landscape = landscape;
        }
    }

    fn resource_type_at(&self, pos: TilePos) -> ResourceType {
        self.tile(pos).map(|t| t.resource).unwrap_or_default()
    }

    fn resource_amount_at(&self, pos: TilePos) -> u8 {
        self.tile(pos).map_or(0, |t| t.resource_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_object::{ObjectState, TreePhase};

    fn tree(id: u64, pos: TilePos) -> MapObject {
        MapObject::new(ObjectId(id), pos, ObjectState::Tree(TreePhase::Adult))
    }

    #[test]
    fn bounds_follow_dimensions() {
        let grid = TileGrid::new(4, 3);
        assert!(grid.is_in_bounds(TilePos::new(0, 0)));
        assert!(grid.is_in_bounds(TilePos::new(3, 2)));
        assert!(!grid.is_in_bounds(TilePos::new(4, 0)));
        assert!(!grid.is_in_bounds(TilePos::new(0, 3)));
        assert!(!grid.is_in_bounds(TilePos::new(-1, 0)));
    }

    #[test]
    fn out_of_bounds_reads_are_neutral_and_writes_ignored() {
        let mut grid = TileGrid::new(2, 2);
        let outside = TilePos::new(5, 5);
        grid.set_blocked(outside, true);
        grid.set_landscape(outside, LandscapeType::Water);
        grid.add_object(tree(1, outside));
        assert!(!grid.is_blocked(outside));
        assert_eq!(grid.landscape(outside), LandscapeType::Grass);
        assert!(grid.objects_at(outside).is_empty());
        assert!(grid.objects_at_mut(outside).is_empty());
        assert_eq!(grid.remove_object(outside, ObjectId(1)), None);
    }

    #[test]
    fn chain_preserves_insertion_order() {
        let mut grid = TileGrid::new(4, 4);
        let pos = TilePos::new(1, 1);
        grid.add_object(tree(1, pos));
        grid.add_object(MapObject::new(ObjectId(2), pos, ObjectState::Pig));
        grid.add_object(tree(3, pos));

        let ids: Vec<u64> = grid.objects_at(pos).iter().map(|o| o.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(
            grid.object_of_kind(pos, MapObjectKind::TreeAdult).map(|o| o.id),
            Some(ObjectId(1))
        );

        let removed = grid.remove_object_of_kind(pos, MapObjectKind::TreeAdult).unwrap();
        assert_eq!(removed.id, ObjectId(1));
        assert_eq!(
            grid.object_of_kind(pos, MapObjectKind::TreeAdult).map(|o| o.id),
            Some(ObjectId(3))
        );
    }

    #[test]
    fn remove_by_id_leaves_other_objects() {
        let mut grid = TileGrid::new(4, 4);
        let pos = TilePos::new(2, 0);
        grid.add_object(tree(7, pos));
        grid.add_object(tree(8, pos));
        assert!(grid.remove_object(pos, ObjectId(8)).is_some());
        assert!(grid.remove_object(pos, ObjectId(8)).is_none());
        assert_eq!(grid.objects_at(pos).len(), 1);
        assert!(grid.object_mut(pos, ObjectId(7)).is_some());
    }

    #[test]
    fn resource_amount_is_clamped() {
        let mut grid = TileGrid::new(2, 2);
        let pos = TilePos::new(1, 1);
        grid.set_resource(pos, ResourceType::Gold, 200);
        assert_eq!(grid.resource_type_at(pos), ResourceType::Gold);
        assert_eq!(grid.resource_amount_at(pos), MAX_RESOURCE_AMOUNT);
    }

    #[test]
    fn grid_serde_roundtrip() {
        let mut grid = TileGrid::new(3, 3);
        grid.add_object(tree(1, TilePos::new(2, 2)));
        grid.set_blocked(TilePos::new(2, 2), true);
        grid.set_protected(TilePos::new(0, 1), true);
        let json = serde_json::to_string(&grid).unwrap();
        let restored: TileGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(grid, restored);
        assert_eq!(restored.blocked_count(), 1);
    }
}
