// Resource piles and the per-tile pile chain.
//
// A `StackPile` is a counted pile of one material lying on a tile. A tile
// may hold several piles of different materials; together they form the
// tile's pile chain, which is simply the `Stack` objects of the tile's
// object chain in insertion order. "The first pile" always means the first
// in that order, on every peer.
//
// `StackLedger` implements push/pop/steal on top of any `MapObjectsGrid` and
// maintains two invariants:
// - `stolen_marks <= size <= capacity` for every pile;
// - a tile is protected iff its chain holds at least one pile.
//
// Piles block no tiles, so they are linked into the chain directly and
// removed through `placement::remove_object` like any other object.
//
// See also: `objects_manager.rs`, which owns the ledger and exposes these
// operations, `grid.rs` for the chain storage.

use crate::grid::MapObjectsGrid;
use crate::map_object::{MapObject, ObjectState};
use crate::placement;
use crate::types::{MaterialType, ObjectId, TilePos};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// A pile of a single material on a tile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackPile {
    material: MaterialType,
    size: u8,
    /// Units a thief has already earmarked. Never exceeds `size`.
    stolen_marks: u8,
}

impl StackPile {
    /// A fresh pile holding one unit.
    pub fn new(material: MaterialType) -> Self {
        Self {
            material,
            size: 1,
            stolen_marks: 0,
        }
    }

    pub fn material(&self) -> MaterialType {
        self.material
    }

    pub fn size(&self) -> u8 {
        self.size
    }

    pub fn stolen_marks(&self) -> u8 {
        self.stolen_marks
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_full(&self, capacity: u8) -> bool {
        self.size >= capacity
    }

    pub fn has_unstolen(&self) -> bool {
        self.stolen_marks < self.size
    }

    pub fn has_stolen_marks(&self) -> bool {
        self.stolen_marks > 0
    }

    fn increment(&mut self) {
        self.size += 1;
    }

    fn decrement(&mut self) {
        self.size = self.size.saturating_sub(1);
        self.stolen_marks = self.stolen_marks.min(self.size);
    }
}

/// Push/pop/steal over a tile's pile chain, bounded by `capacity` units per
/// pile and per tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackLedger {
    capacity: u8,
}

impl StackLedger {
    pub fn new(capacity: u8) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    /// `true` iff the summed size of every pile at `pos` is below capacity.
    pub fn can_push<G: MapObjectsGrid>(&self, grid: &G, pos: TilePos) -> bool {
        if !grid.is_in_bounds(pos) {
            return false;
        }
        let total: u32 = piles(grid, pos).map(|p| u32::from(p.size)).sum();
        total < u32::from(self.capacity)
    }

    /// Put one unit of `material` on `pos`. Starts a new pile (and protects
    /// the tile) if none of that material lies there; fails without change if
    /// the existing pile is full.
    pub fn push_material<G: MapObjectsGrid>(
        &self,
        grid: &mut G,
        pos: TilePos,
        material: MaterialType,
        next_id: impl FnOnce() -> ObjectId,
    ) -> bool {
        if !grid.is_in_bounds(pos) {
            return false;
        }
        let capacity = self.capacity;
        let existing = grid
            .objects_at_mut(pos)
            .iter_mut()
            .filter_map(MapObject::as_stack_mut)
            .find(|p| p.material == material);
        match existing {
            Some(pile) if pile.is_full(capacity) => false,
            Some(pile) => {
                pile.increment();
                true
            }
            None => {
                let pile = MapObject::new(next_id(), pos, ObjectState::Stack(StackPile::new(material)));
                placement::add_unchecked(grid, pile);
                grid.set_protected(pos, true);
                true
            }
        }
    }

    /// Take one unit from the first pile of `material` (any pile if `None`).
    /// Empty piles are unlinked; the tile loses its protection with its last
    /// pile.
    pub fn pop_material<G: MapObjectsGrid>(
        &self,
        grid: &mut G,
        pos: TilePos,
        material: Option<MaterialType>,
    ) -> Option<MaterialType> {
        if !grid.is_in_bounds(pos) {
            return None;
        }
        let pile_obj = grid
            .objects_at_mut(pos)
            .iter_mut()
            .find(|o| matches_material(o, material))?;
        let id = pile_obj.id;
        let pile = pile_obj.as_stack_mut()?;

        if pile.is_empty() {
            // A pile left empty by an earlier path; clean it up.
            self.remove_pile(grid, pos, id);
            return None;
        }

        pile.decrement();
        let popped = pile.material;
        let now_empty = pile.is_empty();
        if now_empty {
            self.remove_pile(grid, pos, id);
        }
        Some(popped)
    }

    /// Adversarial wildcard pop. Player permissions are checked by the
    /// caller.
    pub fn steal_material_at<G: MapObjectsGrid>(
        &self,
        grid: &mut G,
        pos: TilePos,
    ) -> Option<MaterialType> {
        self.pop_material(grid, pos, None)
    }

    /// Earmark one unit of the first pile that still has an unmarked unit.
    pub fn mark_stolen<G: MapObjectsGrid>(&self, grid: &mut G, pos: TilePos) -> bool {
        if !grid.is_in_bounds(pos) {
            return false;
        }
        match piles_mut(grid, pos).find(|p| p.has_unstolen()) {
            Some(pile) => {
                pile.stolen_marks += 1;
                true
            }
            None => false,
        }
    }

    /// Release one earmark from the first pile that has one.
    pub fn unmark_stolen<G: MapObjectsGrid>(&self, grid: &mut G, pos: TilePos) -> bool {
        if !grid.is_in_bounds(pos) {
            return false;
        }
        match piles_mut(grid, pos).find(|p| p.has_stolen_marks()) {
            Some(pile) => {
                pile.stolen_marks -= 1;
                true
            }
            None => false,
        }
    }

    /// `true` if the first pile matching `material` (any if `None`) has units.
    pub fn can_pop<G: MapObjectsGrid>(
        &self,
        grid: &G,
        pos: TilePos,
        material: Option<MaterialType>,
    ) -> bool {
        first_matching(grid, pos, material).is_some_and(|p| !p.is_empty())
    }

    /// Size of the first pile matching `material` (any if `None`), 0 if none.
    pub fn stack_size<G: MapObjectsGrid>(
        &self,
        grid: &G,
        pos: TilePos,
        material: Option<MaterialType>,
    ) -> u8 {
        first_matching(grid, pos, material).map_or(0, StackPile::size)
    }

    /// Material of the first pile at `pos`.
    pub fn material_type_at<G: MapObjectsGrid>(&self, grid: &G, pos: TilePos) -> Option<MaterialType> {
        first_matching(grid, pos, None).map(StackPile::material)
    }

    /// `true` if any pile at `pos` still has an unmarked unit.
    pub fn has_stealable_material<G: MapObjectsGrid>(&self, grid: &G, pos: TilePos) -> bool {
        piles(grid, pos).any(StackPile::has_unstolen)
    }

    /// Unlink the first pile at `pos` with all its units, as when a building
    /// is placed over it.
    pub fn remove_first_pile<G: MapObjectsGrid>(
        &self,
        grid: &mut G,
        pos: TilePos,
    ) -> Option<MapObject> {
        let id = grid.objects_at(pos).iter().find(|o| o.as_stack().is_some())?.id;
        self.remove_pile(grid, pos, id)
    }

    fn remove_pile<G: MapObjectsGrid>(
        &self,
        grid: &mut G,
        pos: TilePos,
        id: ObjectId,
    ) -> Option<MapObject> {
        let removed = placement::remove_object(grid, pos, id);
        if piles(grid, pos).next().is_none() {
            trace!(%pos, "last pile removed, tile unprotected");
            grid.set_protected(pos, false);
        }
        removed
    }
}

fn matches_material(object: &MapObject, material: Option<MaterialType>) -> bool {
    object
        .as_stack()
        .is_some_and(|p| material.is_none_or(|m| p.material == m))
}

fn piles<G: MapObjectsGrid>(grid: &G, pos: TilePos) -> impl Iterator<Item = &StackPile> {
    grid.objects_at(pos).iter().filter_map(MapObject::as_stack)
}

fn piles_mut<G: MapObjectsGrid>(grid: &mut G, pos: TilePos) -> impl Iterator<Item = &mut StackPile> {
    grid.objects_at_mut(pos)
        .iter_mut()
        .filter_map(MapObject::as_stack_mut)
}

fn first_matching<G: MapObjectsGrid>(
    grid: &G,
    pos: TilePos,
    material: Option<MaterialType>,
) -> Option<&StackPile> {
    piles(grid, pos).find(|p| material.is_none_or(|m| p.material == m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileGrid;

    struct Fixture {
        grid: TileGrid,
        ledger: StackLedger,
        next_id: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                grid: TileGrid::new(8, 8),
                ledger: StackLedger::new(8),
                next_id: 0,
            }
        }

        fn push(&mut self, pos: TilePos, material: MaterialType) -> bool {
            let next_id = &mut self.next_id;
            self.ledger.push_material(&mut self.grid, pos, material, || {
                *next_id += 1;
                ObjectId(*next_id)
            })
        }

        fn pop(&mut self, pos: TilePos, material: Option<MaterialType>) -> Option<MaterialType> {
            self.ledger.pop_material(&mut self.grid, pos, material)
        }

        fn pile_count(&self, pos: TilePos) -> usize {
            piles(&self.grid, pos).count()
        }
    }

    const POS: TilePos = TilePos::new(3, 4);

    #[test]
    fn push_four_pop_four_then_none() {
        let mut f = Fixture::new();
        assert!(!f.grid.is_protected(POS));

        for expected in 1..=4 {
            assert!(f.push(POS, MaterialType::Plank));
            assert!(f.grid.is_protected(POS), "first push protects the tile");
            assert_eq!(f.ledger.stack_size(&f.grid, POS, Some(MaterialType::Plank)), expected);
        }

        for remaining in (0..4).rev() {
            assert_eq!(f.pop(POS, Some(MaterialType::Plank)), Some(MaterialType::Plank));
            assert_eq!(f.ledger.stack_size(&f.grid, POS, Some(MaterialType::Plank)), remaining);
            assert_eq!(f.grid.is_protected(POS), remaining > 0);
        }

        assert_eq!(f.pop(POS, Some(MaterialType::Plank)), None);
        assert_eq!(f.pile_count(POS), 0);
    }

    #[test]
    fn ninth_unit_of_same_material_rejected() {
        let mut f = Fixture::new();
        for _ in 0..8 {
            assert!(f.ledger.can_push(&f.grid, POS));
            assert!(f.push(POS, MaterialType::Stone));
        }
        assert!(!f.ledger.can_push(&f.grid, POS));
        assert!(!f.push(POS, MaterialType::Stone));
        assert_eq!(f.ledger.stack_size(&f.grid, POS, Some(MaterialType::Stone)), 8);
        assert_eq!(f.pile_count(POS), 1);
    }

    #[test]
    fn can_push_counts_across_the_chain() {
        let mut f = Fixture::new();
        for _ in 0..5 {
            f.push(POS, MaterialType::Plank);
        }
        for _ in 0..2 {
            f.push(POS, MaterialType::Stone);
        }
        assert_eq!(f.pile_count(POS), 2);
        assert!(f.ledger.can_push(&f.grid, POS));
        f.push(POS, MaterialType::Trunk);
        assert!(!f.ledger.can_push(&f.grid, POS), "total is now 8");
    }

    #[test]
    fn wildcard_pop_takes_first_pile() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Fish);
        f.push(POS, MaterialType::Bread);
        assert_eq!(f.ledger.material_type_at(&f.grid, POS), Some(MaterialType::Fish));
        assert_eq!(f.ledger.steal_material_at(&mut f.grid, POS), Some(MaterialType::Fish));
        // Fish pile is gone, bread remains and keeps the tile protected.
        assert_eq!(f.ledger.material_type_at(&f.grid, POS), Some(MaterialType::Bread));
        assert!(f.grid.is_protected(POS));
        assert_eq!(f.ledger.steal_material_at(&mut f.grid, POS), Some(MaterialType::Bread));
        assert!(!f.grid.is_protected(POS));
        assert_eq!(f.ledger.steal_material_at(&mut f.grid, POS), None);
    }

    #[test]
    fn pop_of_absent_material_changes_nothing() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Coal);
        assert_eq!(f.pop(POS, Some(MaterialType::Gold)), None);
        assert_eq!(f.ledger.stack_size(&f.grid, POS, Some(MaterialType::Coal)), 1);
        assert!(f.grid.is_protected(POS));
        assert!(!f.ledger.can_pop(&f.grid, POS, Some(MaterialType::Gold)));
        assert!(f.ledger.can_pop(&f.grid, POS, Some(MaterialType::Coal)));
        assert!(f.ledger.can_pop(&f.grid, POS, None));
    }

    #[test]
    fn stolen_marks_stay_within_pile_bounds() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Gold);
        f.push(POS, MaterialType::Gold);

        assert!(!f.ledger.unmark_stolen(&mut f.grid, POS), "nothing to unmark yet");
        assert!(f.ledger.mark_stolen(&mut f.grid, POS));
        assert!(f.ledger.mark_stolen(&mut f.grid, POS));
        assert!(!f.ledger.mark_stolen(&mut f.grid, POS), "both units already marked");
        assert!(!f.ledger.has_stealable_material(&f.grid, POS));

        let pile = first_matching(&f.grid, POS, None).unwrap();
        assert_eq!(pile.stolen_marks(), 2);

        assert!(f.ledger.unmark_stolen(&mut f.grid, POS));
        assert!(f.ledger.unmark_stolen(&mut f.grid, POS));
        assert!(!f.ledger.unmark_stolen(&mut f.grid, POS));
        assert!(f.ledger.has_stealable_material(&f.grid, POS));
    }

    #[test]
    fn mark_skips_fully_marked_pile() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Iron);
        f.push(POS, MaterialType::Coal);
        assert!(f.ledger.mark_stolen(&mut f.grid, POS));
        assert!(f.ledger.mark_stolen(&mut f.grid, POS));
        let marks: Vec<u8> = piles(&f.grid, POS).map(StackPile::stolen_marks).collect();
        assert_eq!(marks, vec![1, 1]);
    }

    #[test]
    fn pop_clamps_stolen_marks_to_size() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Wine);
        f.push(POS, MaterialType::Wine);
        f.ledger.mark_stolen(&mut f.grid, POS);
        f.ledger.mark_stolen(&mut f.grid, POS);
        f.pop(POS, Some(MaterialType::Wine));
        let pile = first_matching(&f.grid, POS, None).unwrap();
        assert_eq!(pile.size(), 1);
        assert_eq!(pile.stolen_marks(), 1);
    }

    #[test]
    fn out_of_bounds_operations_are_rejected() {
        let mut f = Fixture::new();
        let outside = TilePos::new(-1, 2);
        assert!(!f.push(outside, MaterialType::Plank));
        assert_eq!(f.pop(outside, None), None);
        assert!(!f.ledger.mark_stolen(&mut f.grid, outside));
        assert!(!f.ledger.can_pop(&f.grid, outside, None));
        assert!(!f.ledger.can_push(&f.grid, outside));
    }

    #[test]
    fn removing_whole_piles_releases_protection_with_the_last() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Plank);
        f.push(POS, MaterialType::Plank);
        f.push(POS, MaterialType::Stone);

        let removed = f.ledger.remove_first_pile(&mut f.grid, POS).unwrap();
        assert_eq!(removed.as_stack().map(StackPile::size), Some(2));
        assert!(f.grid.is_protected(POS));

        assert!(f.ledger.remove_first_pile(&mut f.grid, POS).is_some());
        assert!(!f.grid.is_protected(POS));
        assert_eq!(f.pile_count(POS), 0);
        assert!(f.ledger.remove_first_pile(&mut f.grid, POS).is_none());
    }

    #[test]
    fn protection_follows_piles_not_other_objects() {
        use crate::map_object::PlainKind;

        let mut f = Fixture::new();
        let marker = MapObject::new(
            ObjectId(100),
            POS,
            ObjectState::Standard {
                kind: PlainKind::FlagDoor,
                blocking: false,
                player: None,
            },
        );
        placement::add_unchecked(&mut f.grid, marker);
        f.push(POS, MaterialType::Plank);
        assert_eq!(f.pop(POS, None), Some(MaterialType::Plank));
        assert!(!f.grid.is_protected(POS));
        assert_eq!(f.grid.objects_at(POS).len(), 1);
    }

    #[test]
    fn piles_do_not_block_tiles() {
        let mut f = Fixture::new();
        f.push(POS, MaterialType::Plank);
        assert!(!f.grid.is_blocked(POS));
    }
}
