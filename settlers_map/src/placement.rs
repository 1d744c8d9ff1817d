// Footprint placement and removal.
//
// `try_place` is all-or-nothing: the anchor and every footprint tile must be
// in bounds and unblocked, or nothing changes. On success the object joins the
// anchor tile's chain and its footprint is blocked. Removal unblocks exactly
// the removed object's footprint.
//
// Because placement refuses any overlap with a blocked tile, the footprints of
// live blocking objects are pairwise disjoint, and a tile is blocked iff some
// live placed object covers it. That is what makes plain unblocking on
// removal correct.
//
// Non-blocking objects (piles, decorations) may share tiles freely and go
// through `add_unchecked`.

use crate::grid::MapObjectsGrid;
use crate::map_object::{MapObject, MapObjectKind};
use crate::types::{ObjectId, TilePos};
use tracing::debug;

/// Place `object` at its anchor if its whole footprint is free.
pub fn try_place<G: MapObjectsGrid>(grid: &mut G, object: MapObject) -> bool {
    if !grid.is_in_bounds(object.anchor) {
        debug!(id = %object.id, anchor = %object.anchor, "placement rejected: anchor out of bounds");
        return false;
    }
    if let Some(tile) = object
        .footprint_tiles()
        .find(|&t| !grid.is_in_bounds(t) || grid.is_blocked(t))
    {
        debug!(
            id = %object.id,
            kind = ?object.kind(),
            anchor = %object.anchor,
            %tile,
            "placement rejected: footprint tile unavailable"
        );
        return false;
    }
    set_blocked_for_object(grid, &object, true);
    grid.add_object(object);
    true
}

/// Link a non-blocking object without footprint checks.
pub fn add_unchecked<G: MapObjectsGrid>(grid: &mut G, object: MapObject) {
    debug_assert!(object.blocked_tiles().is_empty());
    grid.add_object(object);
}

/// Remove the object with `id` from the chain at `anchor`. `None` if it is
/// already gone.
pub fn remove_object<G: MapObjectsGrid>(
    grid: &mut G,
    anchor: TilePos,
    id: ObjectId,
) -> Option<MapObject> {
    let removed = grid.remove_object(anchor, id)?;
    set_blocked_for_object(grid, &removed, false);
    debug!(%id, kind = ?removed.kind(), %anchor, "object removed");
    Some(removed)
}

/// Remove the first object of `kind` at `anchor`.
pub fn remove_object_of_kind<G: MapObjectsGrid>(
    grid: &mut G,
    anchor: TilePos,
    kind: MapObjectKind,
) -> Option<MapObject> {
    let removed = grid.remove_object_of_kind(anchor, kind)?;
    set_blocked_for_object(grid, &removed, false);
    debug!(id = %removed.id, ?kind, %anchor, "object removed by kind");
    Some(removed)
}

fn set_blocked_for_object<G: MapObjectsGrid>(grid: &mut G, object: &MapObject, blocked: bool) {
    for tile in object.footprint_tiles() {
        grid.set_blocked(tile, blocked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;
    use crate::map_object::{Footprint, ObjectState, TreePhase};
    use crate::types::{PlayerId, RelativePoint};

    fn stone(id: u64, anchor: TilePos) -> MapObject {
        MapObject::new(ObjectId(id), anchor, ObjectState::Stone { capacity: 3 })
    }

    fn tree(id: u64, anchor: TilePos) -> MapObject {
        MapObject::new(ObjectId(id), anchor, ObjectState::Tree(TreePhase::Growing))
    }

    #[test]
    fn place_blocks_whole_footprint() {
        let mut grid = TileGrid::new(10, 10);
        assert!(try_place(&mut grid, stone(1, TilePos::new(5, 5))));
        for tile in [(5, 5), (4, 5), (5, 4), (4, 4)] {
            assert!(grid.is_blocked(TilePos::new(tile.0, tile.1)));
        }
        assert_eq!(grid.blocked_count(), 4);
        assert_eq!(grid.objects_at(TilePos::new(5, 5)).len(), 1);
        // Only the anchor's chain holds the object.
        assert!(grid.objects_at(TilePos::new(4, 4)).is_empty());
    }

    #[test]
    fn placement_is_atomic_when_one_tile_is_blocked() {
        let mut grid = TileGrid::new(10, 10);
        grid.set_blocked(TilePos::new(4, 4), true);
        let before = grid.clone();

        assert!(!try_place(&mut grid, stone(1, TilePos::new(5, 5))));
        assert_eq!(grid, before);
    }

    #[test]
    fn placement_is_atomic_at_map_edge() {
        let mut grid = TileGrid::new(10, 10);
        let before = grid.clone();
        // Footprint reaches x = -1.
        assert!(!try_place(&mut grid, stone(1, TilePos::new(0, 5))));
        assert_eq!(grid, before);
    }

    #[test]
    fn out_of_bounds_anchor_rejected_even_without_footprint() {
        let mut grid = TileGrid::new(4, 4);
        let pig = MapObject::new(ObjectId(1), TilePos::new(9, 9), ObjectState::Pig);
        assert!(!try_place(&mut grid, pig));
    }

    #[test]
    fn remove_restores_blocked_flags() {
        let mut grid = TileGrid::new(10, 10);
        let empty = grid.clone();
        assert!(try_place(&mut grid, stone(1, TilePos::new(5, 5))));
        let removed = remove_object(&mut grid, TilePos::new(5, 5), ObjectId(1)).unwrap();
        assert_eq!(removed.id, ObjectId(1));
        assert_eq!(grid, empty);

        // Second removal is a no-op.
        assert!(remove_object(&mut grid, TilePos::new(5, 5), ObjectId(1)).is_none());
        assert_eq!(grid, empty);
    }

    #[test]
    fn adjacent_objects_unblock_independently() {
        let mut grid = TileGrid::new(10, 10);
        assert!(try_place(&mut grid, tree(1, TilePos::new(2, 2))));
        assert!(try_place(&mut grid, tree(2, TilePos::new(3, 2))));
        assert!(!try_place(&mut grid, tree(3, TilePos::new(3, 2))));

        remove_object_of_kind(&mut grid, TilePos::new(2, 2), MapObjectKind::TreeGrowing).unwrap();
        assert!(!grid.is_blocked(TilePos::new(2, 2)));
        assert!(grid.is_blocked(TilePos::new(3, 2)));
    }

    #[test]
    fn building_uses_its_own_footprint() {
        let mut grid = TileGrid::new(10, 10);
        let footprint: Footprint = (0..3).map(|dx| RelativePoint::new(dx, 0)).collect();
        let building = MapObject::new(
            ObjectId(1),
            TilePos::new(1, 1),
            ObjectState::Building {
                player: PlayerId(0),
                footprint,
            },
        );
        assert!(try_place(&mut grid, building));
        assert_eq!(grid.blocked_count(), 3);
        assert!(!try_place(&mut grid, tree(2, TilePos::new(3, 1))));
        assert!(try_place(&mut grid, tree(3, TilePos::new(4, 1))));
    }
}
