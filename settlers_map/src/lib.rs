// settlers_map: deterministic map-object core.
//
// This crate contains the map-object lifecycle and timed-event machinery of a
// lockstep settlers game: footprint placement on a hex tile grid, resource
// piles, and the logical-clock event queue that grows trees, ripens corn, and
// clears away arrows and ghosts. It has no rendering or networking
// dependencies and can be tested, benchmarked, and run headless.
//
// Module overview:
// - `sim.rs`:             Top-level SimState, step loop, command dispatch, save/load.
// - `objects_manager.rs`: MapObjectsManager: creation, cutting, piles, timer drain.
// - `map_object.rs`:      MapObject, ObjectState, per-kind lifecycle state machines.
// - `placement.rs`:       All-or-nothing footprint placement and removal.
// - `stack.rs`:           StackPile + StackLedger: push/pop/steal on a tile's pile chain.
// - `grid.rs`:            MapObjectsGrid trait + dense TileGrid.
// - `event.rs`:           EventQueue (priority queue) + narrative MapEvents.
// - `clock.rs`:           SimulationClock and the periodic TimerRegistry.
// - `command.rs`:         SimCommand / SimAction, all external map mutations.
// - `config.rs`:          GameConfig: every tunable duration and capacity.
// - `error.rs`:           ConfigError / SimError.
// - `types.rs`:           TilePos, RelativePoint, IDs, material/landscape/resource enums.
// - `prng`:               Re-exported from `settlers_prng`.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, commands) -> (new_state, events)`. All randomness comes from an
// injected `DeterministicRng`. No `HashMap`, no system time, no OS entropy.
// Use `BTreeMap`/`BTreeSet` for ordered collections.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod grid;
pub mod map_object;
pub mod objects_manager;
pub mod placement;
pub use settlers_prng as prng;
pub mod sim;
pub mod stack;
pub mod types;
