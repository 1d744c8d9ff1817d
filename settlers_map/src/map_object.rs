// Map objects and their per-kind lifecycle rules.
//
// A `MapObject` is an ID, the anchor tile whose object chain owns it, and an
// `ObjectState`, a closed enum with one variant per object family. The grid
// is queried by `MapObjectKind`, a `Copy` tag derived from the state: a tree
// reports `TreeGrowing`, `TreeAdult`, or `TreeDead` depending on its phase,
// so "find the adult tree at this tile" is a plain kind lookup.
//
// Objects with no lifecycle of their own (decorations, leftovers, markers)
// are tagged with a `PlainKind`, which has no tree, corn, stone, or pile
// variants. A lookup for one of those kinds therefore only ever finds the
// real object.
//
// ## Lifecycle
//
// Timed objects walk small, strictly forward state machines:
//
//   Tree:  Growing -> Adult -(cut)-> Dead
//   Corn:  Growing -> Adult -> Decomposing
//                       \-(harvest)-> Harvested
//   Arrow: Flying -> Landed
//   Stone: capacity N -(cut)-> ... -> 0
//
// `change_state()` is the hook a non-removal `TimeEvent` invokes. It advances
// only out of the phase that has a timed successor and returns `None`
// otherwise, so an event left in the queue after an external action (a
// harvest, a cut) is absorbed instead of double-applying or resurrecting a
// terminal object. `cut_off()` is the externally triggered transition.
//
// ## Footprints
//
// `blocked_tiles()` returns the offsets (relative to the anchor) the object
// blocks. Most transient objects block nothing. Buildings and towers carry
// their own footprint.
//
// See also: `objects_manager.rs`, which creates these objects and schedules
// their events, `placement.rs` for footprint placement, `stack.rs` for the
// `StackPile` payload.

use crate::stack::StackPile;
use crate::types::{ObjectId, ObjectRef, PlayerId, RelativePoint, ResourceType, TilePos};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Footprint storage for objects whose shape is supplied by the caller.
pub type Footprint = SmallVec<[RelativePoint; 16]>;

const SINGLE_TILE: &[RelativePoint] = &[RelativePoint::new(0, 0)];

const STONE_FOOTPRINT: &[RelativePoint] = &[
    RelativePoint::new(0, 0),
    RelativePoint::new(-1, 0),
    RelativePoint::new(0, -1),
    RelativePoint::new(-1, -1),
];

const NOTHING: &[RelativePoint] = &[];

/// Type tag used to query a tile's object chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MapObjectKind {
    TreeGrowing,
    TreeAdult,
    TreeDead,
    Stone,
    CutOffStone,
    CornGrowing,
    CornAdult,
    CornDead,
    Stack,
    Arrow,
    Ghost,
    BuildingDeconstructionSmoke,
    ResourceSign,
    ConstructionMark,
    BuildingWorkArea,
    Pig,
    Waves,
    FishDecoration,
    PlantDecoration,
    DesertDecoration,
    FlagDoor,
    Building,
    AttackableTower,
}

/// Tag of an object without a lifecycle or payload of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlainKind {
    CutOffStone,
    Ghost,
    BuildingDeconstructionSmoke,
    Waves,
    FishDecoration,
    PlantDecoration,
    DesertDecoration,
    FlagDoor,
}

impl PlainKind {
    /// Ghosts and deconstruction smoke play a sound when shown.
    pub fn is_soundable(self) -> bool {
        matches!(self, PlainKind::Ghost | PlainKind::BuildingDeconstructionSmoke)
    }
}

impl From<PlainKind> for MapObjectKind {
    fn from(kind: PlainKind) -> Self {
        match kind {
            PlainKind::CutOffStone => MapObjectKind::CutOffStone,
            PlainKind::Ghost => MapObjectKind::Ghost,
            PlainKind::BuildingDeconstructionSmoke => MapObjectKind::BuildingDeconstructionSmoke,
            PlainKind::Waves => MapObjectKind::Waves,
            PlainKind::FishDecoration => MapObjectKind::FishDecoration,
            PlainKind::PlantDecoration => MapObjectKind::PlantDecoration,
            PlainKind::DesertDecoration => MapObjectKind::DesertDecoration,
            PlainKind::FlagDoor => MapObjectKind::FlagDoor,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TreePhase {
    Growing,
    Adult,
    Dead,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CornPhase {
    Growing,
    Adult,
    Decomposing,
    Harvested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArrowPhase {
    Flying,
    Landed,
}

/// An arrow in flight towards `target`, or lying there after landing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub phase: ArrowPhase,
    pub shooter: TilePos,
    pub player: PlayerId,
    pub hit_strength: f32,
}

/// Kind-specific mutable state of a map object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectState {
    Tree(TreePhase),
    Corn(CornPhase),
    /// A stone deposit; each cut removes one unit.
    Stone { capacity: u8 },
    Stack(StackPile),
    Arrow(Arrow),
    /// Removed by a single scheduled event after `duration_secs`.
    SelfDeleting {
        kind: PlainKind,
        duration_secs: f32,
        player: Option<PlayerId>,
        /// Ghosts and deconstruction smoke play a sound when shown.
        soundable: bool,
    },
    /// Marks the underground resource found by a geologist. `amount` is the
    /// tile's resource amount normalized to [0, 1].
    ResourceSign { resource: ResourceType, amount: f32 },
    Standard {
        kind: PlainKind,
        blocking: bool,
        player: Option<PlayerId>,
    },
    BuildingWorkArea { radius: f32 },
    ConstructionMark { value: u8 },
    Pig,
    Decoration(PlainKind),
    Building {
        player: PlayerId,
        footprint: Footprint,
    },
    AttackableTower {
        player: PlayerId,
        footprint: Footprint,
    },
}

/// What a scheduled transition actually changed. `None` from
/// `change_state()` means the event was stale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    TreeGrown,
    CornGrown,
    CornDecomposing,
    ArrowLanded {
        target: TilePos,
        player: PlayerId,
        hit_strength: f32,
    },
}

/// An object living in exactly one tile's object chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapObject {
    pub id: ObjectId,
    pub anchor: TilePos,
    pub state: ObjectState,
}

impl MapObject {
    pub fn new(id: ObjectId, anchor: TilePos, state: ObjectState) -> Self {
        Self { id, anchor, state }
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            anchor: self.anchor,
            id: self.id,
        }
    }

    pub fn kind(&self) -> MapObjectKind {
        match &self.state {
            ObjectState::Tree(TreePhase::Growing) => MapObjectKind::TreeGrowing,
            ObjectState::Tree(TreePhase::Adult) => MapObjectKind::TreeAdult,
            ObjectState::Tree(TreePhase::Dead) => MapObjectKind::TreeDead,
            ObjectState::Corn(CornPhase::Growing) => MapObjectKind::CornGrowing,
            ObjectState::Corn(CornPhase::Adult) => MapObjectKind::CornAdult,
            ObjectState::Corn(CornPhase::Decomposing | CornPhase::Harvested) => {
                MapObjectKind::CornDead
            }
            ObjectState::Stone { .. } => MapObjectKind::Stone,
            ObjectState::Stack(_) => MapObjectKind::Stack,
            ObjectState::Arrow(_) => MapObjectKind::Arrow,
            ObjectState::SelfDeleting { kind, .. } => (*kind).into(),
            ObjectState::ResourceSign { .. } => MapObjectKind::ResourceSign,
            ObjectState::Standard { kind, .. } => (*kind).into(),
            ObjectState::BuildingWorkArea { .. } => MapObjectKind::BuildingWorkArea,
            ObjectState::ConstructionMark { .. } => MapObjectKind::ConstructionMark,
            ObjectState::Pig => MapObjectKind::Pig,
            ObjectState::Decoration(kind) => (*kind).into(),
            ObjectState::Building { .. } => MapObjectKind::Building,
            ObjectState::AttackableTower { .. } => MapObjectKind::AttackableTower,
        }
    }

    /// Offsets from the anchor this object blocks while placed.
    pub fn blocked_tiles(&self) -> &[RelativePoint] {
        match &self.state {
            ObjectState::Tree(_) | ObjectState::Corn(_) => SINGLE_TILE,
            ObjectState::Stone { .. } => STONE_FOOTPRINT,
            ObjectState::Standard { blocking: true, .. } => SINGLE_TILE,
            ObjectState::Building { footprint, .. }
            | ObjectState::AttackableTower { footprint, .. } => footprint.as_slice(),
            ObjectState::Standard { blocking: false, .. }
            | ObjectState::Stack(_)
            | ObjectState::Arrow(_)
            | ObjectState::SelfDeleting { .. }
            | ObjectState::ResourceSign { .. }
            | ObjectState::BuildingWorkArea { .. }
            | ObjectState::ConstructionMark { .. }
            | ObjectState::Pig
            | ObjectState::Decoration(_) => NOTHING,
        }
    }

    /// Absolute tiles of `blocked_tiles()` for the current anchor.
    pub fn footprint_tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        let anchor = self.anchor;
        self.blocked_tiles().iter().map(move |p| p.calculate(anchor))
    }

    /// Scheduled (non-removal) transition hook.
    pub fn change_state(&mut self) -> Option<Transition> {
        let target = self.anchor;
        match &mut self.state {
            ObjectState::Tree(phase @ TreePhase::Growing) => {
                *phase = TreePhase::Adult;
                Some(Transition::TreeGrown)
            }
            ObjectState::Corn(phase @ CornPhase::Growing) => {
                *phase = CornPhase::Adult;
                Some(Transition::CornGrown)
            }
            ObjectState::Corn(phase @ CornPhase::Adult) => {
                *phase = CornPhase::Decomposing;
                Some(Transition::CornDecomposing)
            }
            ObjectState::Arrow(arrow) if arrow.phase == ArrowPhase::Flying => {
                arrow.phase = ArrowPhase::Landed;
                Some(Transition::ArrowLanded {
                    target,
                    player: arrow.player,
                    hit_strength: arrow.hit_strength,
                })
            }
            _ => None,
        }
    }

    /// Externally triggered cut or harvest. Returns `false` without changing
    /// anything if the object is not currently cuttable.
    pub fn cut_off(&mut self) -> bool {
        match &mut self.state {
            ObjectState::Tree(phase @ TreePhase::Adult) => {
                *phase = TreePhase::Dead;
                true
            }
            ObjectState::Corn(phase @ CornPhase::Adult) => {
                *phase = CornPhase::Harvested;
                true
            }
            ObjectState::Stone { capacity } if *capacity > 0 => {
                *capacity -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn can_be_cut(&self) -> bool {
        match &self.state {
            ObjectState::Tree(phase) => *phase == TreePhase::Adult,
            ObjectState::Corn(phase) => *phase == CornPhase::Adult,
            ObjectState::Stone { capacity } => *capacity > 0,
            ObjectState::Pig => true,
            _ => false,
        }
    }

    pub fn as_stack(&self) -> Option<&StackPile> {
        match &self.state {
            ObjectState::Stack(pile) => Some(pile),
            _ => None,
        }
    }

    pub fn as_stack_mut(&mut self) -> Option<&mut StackPile> {
        match &mut self.state {
            ObjectState::Stack(pile) => Some(pile),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MaterialType;

    fn object(state: ObjectState) -> MapObject {
        MapObject::new(ObjectId(1), TilePos::new(5, 5), state)
    }

    #[test]
    fn tree_grows_once_then_ignores_events() {
        let mut tree = object(ObjectState::Tree(TreePhase::Growing));
        assert_eq!(tree.kind(), MapObjectKind::TreeGrowing);
        assert!(!tree.can_be_cut());

        assert_eq!(tree.change_state(), Some(Transition::TreeGrown));
        assert_eq!(tree.kind(), MapObjectKind::TreeAdult);
        assert!(tree.can_be_cut());

        // A duplicate growth event is stale.
        assert_eq!(tree.change_state(), None);
        assert_eq!(tree.kind(), MapObjectKind::TreeAdult);
    }

    #[test]
    fn tree_cut_only_once() {
        let mut tree = object(ObjectState::Tree(TreePhase::Adult));
        assert!(tree.cut_off());
        assert_eq!(tree.kind(), MapObjectKind::TreeDead);
        assert!(!tree.cut_off());
        assert_eq!(tree.change_state(), None);
    }

    #[test]
    fn growing_tree_cannot_be_cut() {
        let mut tree = object(ObjectState::Tree(TreePhase::Growing));
        assert!(!tree.cut_off());
        assert_eq!(tree.kind(), MapObjectKind::TreeGrowing);
    }

    #[test]
    fn corn_walks_growing_adult_decomposing() {
        let mut corn = object(ObjectState::Corn(CornPhase::Growing));
        assert_eq!(corn.change_state(), Some(Transition::CornGrown));
        assert_eq!(corn.kind(), MapObjectKind::CornAdult);
        assert_eq!(corn.change_state(), Some(Transition::CornDecomposing));
        assert_eq!(corn.kind(), MapObjectKind::CornDead);
        assert_eq!(corn.change_state(), None);
    }

    #[test]
    fn harvested_corn_absorbs_decompose_event() {
        let mut corn = object(ObjectState::Corn(CornPhase::Adult));
        assert!(corn.cut_off());
        assert_eq!(corn.state, ObjectState::Corn(CornPhase::Harvested));
        assert_eq!(corn.change_state(), None);
        assert_eq!(corn.state, ObjectState::Corn(CornPhase::Harvested));
    }

    #[test]
    fn stone_cut_decrements_to_zero() {
        let mut stone = object(ObjectState::Stone { capacity: 2 });
        assert!(stone.cut_off());
        assert!(stone.can_be_cut());
        assert!(stone.cut_off());
        assert!(!stone.can_be_cut());
        assert!(!stone.cut_off());
        assert_eq!(stone.state, ObjectState::Stone { capacity: 0 });
    }

    #[test]
    fn arrow_lands_once() {
        let mut arrow = object(ObjectState::Arrow(Arrow {
            phase: ArrowPhase::Flying,
            shooter: TilePos::new(0, 0),
            player: PlayerId(2),
            hit_strength: 0.5,
        }));
        assert_eq!(
            arrow.change_state(),
            Some(Transition::ArrowLanded {
                target: TilePos::new(5, 5),
                player: PlayerId(2),
                hit_strength: 0.5,
            })
        );
        assert_eq!(arrow.change_state(), None);
    }

    #[test]
    fn footprints_per_kind() {
        let tree = object(ObjectState::Tree(TreePhase::Growing));
        assert_eq!(tree.footprint_tiles().collect::<Vec<_>>(), vec![TilePos::new(5, 5)]);

        let stone = object(ObjectState::Stone { capacity: 3 });
        assert_eq!(stone.blocked_tiles().len(), 4);

        let pile = object(ObjectState::Stack(StackPile::new(MaterialType::Plank)));
        assert!(pile.blocked_tiles().is_empty());

        let fence = object(ObjectState::Standard {
            kind: PlainKind::FlagDoor,
            blocking: true,
            player: None,
        });
        assert_eq!(fence.blocked_tiles().len(), 1);

        let footprint: Footprint = [RelativePoint::new(0, 0), RelativePoint::new(1, 0)]
            .into_iter()
            .collect();
        let building = object(ObjectState::Building {
            player: PlayerId(0),
            footprint,
        });
        assert_eq!(
            building.footprint_tiles().collect::<Vec<_>>(),
            vec![TilePos::new(5, 5), TilePos::new(6, 5)]
        );
    }

    #[test]
    fn pig_is_always_adult() {
        let pig = object(ObjectState::Pig);
        assert!(pig.can_be_cut());
        assert!(pig.blocked_tiles().is_empty());
    }

    #[test]
    fn plain_kinds_never_report_lifecycle_or_pile_kinds() {
        let all = [
            PlainKind::CutOffStone,
            PlainKind::Ghost,
            PlainKind::BuildingDeconstructionSmoke,
            PlainKind::Waves,
            PlainKind::FishDecoration,
            PlainKind::PlantDecoration,
            PlainKind::DesertDecoration,
            PlainKind::FlagDoor,
        ];
        for kind in all {
            let placeholder = object(ObjectState::Standard {
                kind,
                blocking: false,
                player: None,
            });
            assert!(placeholder.as_stack().is_none());
            assert!(!placeholder.can_be_cut());
            assert!(!matches!(
                placeholder.kind(),
                MapObjectKind::TreeGrowing
                    | MapObjectKind::TreeAdult
                    | MapObjectKind::TreeDead
                    | MapObjectKind::Stone
                    | MapObjectKind::CornGrowing
                    | MapObjectKind::CornAdult
                    | MapObjectKind::CornDead
                    | MapObjectKind::Stack
                    | MapObjectKind::ConstructionMark
            ));
        }
        assert!(PlainKind::Ghost.is_soundable());
        assert!(!PlainKind::CutOffStone.is_soundable());
    }

    #[test]
    fn state_serialization_roundtrip() {
        let corn = object(ObjectState::Corn(CornPhase::Harvested));
        let json = serde_json::to_string(&corn).unwrap();
        let restored: MapObject = serde_json::from_str(&json).unwrap();
        assert_eq!(corn, restored);
    }
}
