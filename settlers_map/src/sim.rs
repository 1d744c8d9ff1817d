// Top-level simulation state and step loop.
//
// `SimState` is the single source of truth for a map session. It owns the
// `MapObjectsManager` (grid, event queue, clock, RNG, config) and the
// transient `TimerRegistry`. The sim is a pure function:
// `(state, commands) -> (new_state, events)`.
//
// ## Step loop
//
// `step(commands, target_ms)` is the critical section: commands and timer
// drains for one step run under a single `&mut self`, so they never
// interleave. Time advances through the union of command times and timer
// boundaries up to `target_ms`:
//
//   1. Pick the earlier of the next command time and the next timer
//      boundary, and advance the clock there.
//   2. Apply every command at that time, in slice order.
//   3. Fire every timer boundary at or before that time; each registered
//      client is called once per boundary.
//
// At equal times commands go first, so an object created at t = 60 000 sees
// the 60 000 drain. Commands must be sorted by `time_ms`; commands later than
// `target_ms` are left for the next step, and commands earlier than the
// current clock are applied now with a warning.
//
// ## Save/load
//
// The timer registry is skipped during serialization and rebuilt by
// `rebuild_transient_state()`, which re-registers the manager on the next
// boundary after the restored clock. Queue sequence numbers and the object ID
// counter are part of the snapshot, so a resumed session continues exactly
// like an uninterrupted one.
//
// See also: `objects_manager.rs` for the operations commands dispatch to,
// `command.rs` for the command vocabulary, `clock.rs` for the registry.
//
// **Critical constraint: determinism.** The sim must produce identical results
// given the same seed, config, and command sequence.

use crate::clock::{TimerClient, TimerRegistry};
use crate::command::{SimAction, SimCommand};
use crate::config::GameConfig;
use crate::error::SimError;
use crate::event::MapEvent;
use crate::grid::TileGrid;
use crate::objects_manager::MapObjectsManager;
use serde::{Deserialize, Serialize};
use settlers_prng::GameRng;
use tracing::{debug, info, warn};

/// Top-level simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimState {
    /// Seed the RNG was created from. Informational; the RNG state itself is
    /// saved inside `objects`.
    pub seed: u64,

    /// All map objects, their pending events, and the logical clock.
    pub objects: MapObjectsManager,

    /// Periodic timer. Rebuilt from the clock on load, not serialized.
    #[serde(skip)]
    timers: TimerRegistry,
}

/// The result of processing commands and advancing the simulation.
pub struct StepResult {
    /// Narrative events emitted during this step.
    pub events: Vec<MapEvent>,
    /// Commands whose action the map could not honour (blocked tile, full
    /// pile, nothing to cut).
    pub rejected: usize,
}

impl SimState {
    /// Create a new simulation with default config and the given seed.
    pub fn new(seed: u64) -> Self {
        Self::build(seed, GameConfig::default())
    }

    /// Create a new simulation with the given seed and config.
    pub fn with_config(seed: u64, config: GameConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self::build(seed, config))
    }

    fn build(seed: u64, config: GameConfig) -> Self {
        let (width, height) = config.world_size;
        info!(seed, width, height, "creating map simulation");
        let grid = TileGrid::new(width, height);
        let objects = MapObjectsManager::new(grid, config, GameRng::new(seed));
        let mut state = Self {
            seed,
            objects,
            timers: TimerRegistry::default(),
        };
        state.rebuild_transient_state();
        state
    }

    /// Current logical time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.objects.now_ms()
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// Apply a batch of commands and advance the sim to `target_ms`, firing
    /// every timer boundary on the way.
    pub fn step(&mut self, commands: &[SimCommand], target_ms: u64) -> StepResult {
        let mut rejected = 0;
        let mut cmd_idx = 0;

        loop {
            let now = self.now_ms();
            let next_cmd_time = commands
                .get(cmd_idx)
                .filter(|c| c.time_ms <= target_ms)
                .map(|c| c.time_ms.max(now));
            let next_tick = Some(self.timers.next_tick_ms()).filter(|&t| t <= target_ms);

            let next_time = match (next_cmd_time, next_tick) {
                (Some(ct), Some(tt)) => ct.min(tt),
                (Some(ct), None) => ct,
                (None, Some(tt)) => tt,
                (None, None) => break,
            };
            self.objects.advance_clock(next_time);

            while let Some(cmd) = commands.get(cmd_idx).filter(|c| c.time_ms <= next_time) {
                cmd_idx += 1;
                if cmd.time_ms < now {
                    warn!(
                        cmd_time = cmd.time_ms,
                        now, "command arrived late, applying at current time"
                    );
                }
                if !self.apply_command(cmd) {
                    rejected += 1;
                }
            }

            let clients: Vec<TimerClient> = self.timers.clients().collect();
            for tick in self.timers.due_ticks(next_time) {
                for client in &clients {
                    match client {
                        TimerClient::MapObjects => {
                            self.objects.timer_event(tick);
                        }
                    }
                }
            }
        }

        self.objects.advance_clock(target_ms);
        StepResult {
            events: self.objects.take_events(),
            rejected,
        }
    }

    /// Apply a single command. Returns `false` if the map rejected it.
    fn apply_command(&mut self, cmd: &SimCommand) -> bool {
        let player = cmd.player;
        let objects = &mut self.objects;
        let honoured = match &cmd.action {
            SimAction::ExecuteSearchType { pos, search } => {
                objects.execute_search_type(*pos, *search)
            }
            SimAction::PlantTree { pos } => objects.plant_tree(*pos),
            SimAction::PlantAdultTree { pos } => objects.plant_adult_tree(*pos),
            SimAction::CutTree { pos } => objects.cut_tree(*pos),
            SimAction::PlantCorn { pos } => objects.plant_corn(*pos),
            SimAction::CutCorn { pos } => objects.cut_corn(*pos),
            SimAction::AddStone { pos, capacity } => objects.add_stone(*pos, *capacity),
            SimAction::CutStone {
                stone_pos,
                remains_pos,
            } => {
                objects.cut_stone(*stone_pos, *remains_pos);
                true
            }
            SimAction::AddResourceSign { pos } => objects.add_resource_sign(*pos),
            SimAction::AddArrow {
                attacked,
                shooter,
                hit_strength,
            } => objects.add_arrow(*attacked, *shooter, player, *hit_strength),
            SimAction::AddSelfDeleting {
                pos,
                kind,
                duration_secs,
            } => objects.add_self_deleting(*pos, *kind, *duration_secs, Some(player)),
            SimAction::AddGhost { pos } => objects.add_ghost(*pos, player),
            SimAction::SetConstructionMarking { pos, value } => {
                objects.set_construction_marking(*pos, *value);
                true
            }
            SimAction::AddSimpleObject {
                pos,
                kind,
                blocking,
            } => objects.add_simple_object(*pos, *kind, *blocking, Some(player)),
            SimAction::AddBuildingWorkArea { pos, radius } => {
                objects.add_building_work_area(*pos, *radius)
            }
            SimAction::PlacePig { pos, place } => {
                objects.place_pig(*pos, *place);
                true
            }
            SimAction::AddWaves { pos } => {
                objects.add_waves(*pos);
                true
            }
            SimAction::AddFish { pos } => {
                objects.add_fish(*pos);
                true
            }
            SimAction::AddBuilding { pos, footprint } => {
                objects.add_building(*pos, footprint.clone(), player)
            }
            SimAction::AddAttackableTower { pos, footprint } => {
                objects.add_attackable_tower(*pos, footprint.clone(), player)
            }
            SimAction::RemoveObjectOfKind { pos, kind } => {
                objects.remove_object_of_kind(*pos, *kind)
            }
            SimAction::PushMaterial { pos, material } => objects.push_material(*pos, *material),
            SimAction::PopMaterial { pos, material } => {
                objects.pop_material(*pos, *material).is_some()
            }
            SimAction::StealMaterial { pos } => objects.steal_material_at(*pos).is_some(),
            SimAction::MarkStolen { pos, mark: true } => objects.mark_stolen(*pos),
            SimAction::MarkStolen { pos, mark: false } => objects.unmark_stolen(*pos),
        };
        if !honoured {
            debug!(player = player.0, action = ?cmd.action, "command rejected by the map");
        }
        honoured
    }

    /// Rebuild all transient (`#[serde(skip)]`) fields after deserialization.
    ///
    /// Restores the timer registry from the saved clock and re-registers the
    /// objects manager with it.
    pub fn rebuild_transient_state(&mut self) {
        let period = self.objects.config().timer_period_ms;
        self.timers = TimerRegistry::new(period, self.now_ms());
        self.timers.register(TimerClient::MapObjects);
    }

    /// Serialize the simulation state to a JSON string.
    pub fn to_json(&self) -> Result<String, SimError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize a simulation state from a JSON string, validate its
    /// config, and rebuild the timer registry.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let mut state: SimState = serde_json::from_str(json)?;
        state.objects.config().validate()?;
        state.rebuild_transient_state();
        info!(now_ms = state.now_ms(), pending = state.objects.queue().len(), "map simulation loaded");
        Ok(state)
    }
}
