// Commands that mutate the map.
//
// All external mutations go through `SimCommand`. In a lockstep session every
// peer receives the same commands, canonically ordered by `time_ms`, and
// applies them through `SimState::step()`, which guarantees identical state.
//
// A `SimCommand` carries the issuing `player`, the logical time it applies at,
// and a `SimAction`. Actions map one-to-one onto `MapObjectsManager`
// operations; the handler in `sim.rs` dispatches them. Actions that carry an
// owner (arrows, ghosts, simple objects, buildings) take it from the command's
// `player`.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to the map. Everything else happens through scheduled events (see
// `event.rs`).

use crate::map_object::{Footprint, MapObjectKind, PlainKind};
use crate::types::{MaterialType, PlayerId, SearchType, TilePos};
use serde::{Deserialize, Serialize};

/// A player-issued command applied at a specific logical time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimCommand {
    pub player: PlayerId,
    pub time_ms: u64,
    pub action: SimAction,
}

/// The specific action a command performs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimAction {
    /// A worker standing at `pos` acts on what its search found.
    ExecuteSearchType { pos: TilePos, search: SearchType },
    PlantTree { pos: TilePos },
    PlantAdultTree { pos: TilePos },
    CutTree { pos: TilePos },
    PlantCorn { pos: TilePos },
    CutCorn { pos: TilePos },
    AddStone { pos: TilePos, capacity: u8 },
    CutStone { stone_pos: TilePos, remains_pos: TilePos },
    AddResourceSign { pos: TilePos },
    AddArrow {
        attacked: TilePos,
        shooter: TilePos,
        hit_strength: f32,
    },
    AddSelfDeleting {
        pos: TilePos,
        kind: PlainKind,
        duration_secs: f32,
    },
    AddGhost { pos: TilePos },
    /// Non-negative values set the mark, negative values clear it.
    SetConstructionMarking { pos: TilePos, value: i8 },
    AddSimpleObject {
        pos: TilePos,
        kind: PlainKind,
        blocking: bool,
    },
    AddBuildingWorkArea { pos: TilePos, radius: f32 },
    PlacePig { pos: TilePos, place: bool },
    AddWaves { pos: TilePos },
    AddFish { pos: TilePos },
    AddBuilding { pos: TilePos, footprint: Footprint },
    AddAttackableTower { pos: TilePos, footprint: Footprint },
    RemoveObjectOfKind { pos: TilePos, kind: MapObjectKind },
    PushMaterial { pos: TilePos, material: MaterialType },
    /// `None` pops from the first pile of any material.
    PopMaterial {
        pos: TilePos,
        material: Option<MaterialType>,
    },
    StealMaterial { pos: TilePos },
    /// Earmark (`true`) or release (`false`) one unit for a thief.
    MarkStolen { pos: TilePos, mark: bool },
}
