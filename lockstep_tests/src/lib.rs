// Test-only lockstep harness for cross-peer determinism tests.
//
// Simulates the lockstep pipeline without a network: commands submitted by
// players are collected per turn, serialized to JSON payloads exactly as they
// would travel over the wire, and every peer decodes and applies the same
// payloads with `SimState::step()` up to the same turn target. Peers share
// nothing but the seed, the config, and the payload bytes.
//
// The only test-specific code is the turn batching; decoding and stepping use
// the same `settlers_map` code paths the game uses.
//
// Peers running the same code always agree with each other, so after every
// turn each peer is also checked on its own by `assert_map_invariants`.
//
// See also: `tests/lockstep.rs` for the scenarios.

use settlers_map::command::{SimAction, SimCommand};
use settlers_map::config::GameConfig;
use settlers_map::grid::MapObjectsGrid;
use settlers_map::sim::{SimState, StepResult};
use settlers_map::types::{PlayerId, TilePos};
use std::collections::BTreeSet;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber writing through the test harness. Honours
/// `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Check the map-wide invariants of one peer:
/// - a tile is blocked iff some live object's footprint covers it;
/// - a tile is protected iff it holds a pile;
/// - every pile holds `1..=stack_size` units and at most that many marks;
/// - no pending event is older than the last timer boundary that fired.
pub fn assert_map_invariants(sim: &SimState) {
    let grid = sim.objects.grid();
    let capacity = sim.objects.config().stack_size;
    let mut covered = BTreeSet::new();
    let mut piled = BTreeSet::new();

    for object in grid.all_objects() {
        covered.extend(object.footprint_tiles());
        if let Some(pile) = object.as_stack() {
            piled.insert(object.anchor);
            assert!(
                (1..=capacity).contains(&pile.size()) && pile.stolen_marks() <= pile.size(),
                "pile {} at {} out of bounds: {pile:?}",
                object.id,
                object.anchor
            );
        }
    }

    for y in 0..i32::from(grid.height()) {
        for x in 0..i32::from(grid.width()) {
            let pos = TilePos::new(x, y);
            assert_eq!(
                grid.is_blocked(pos),
                covered.contains(&pos),
                "blocked flag at {pos} disagrees with live footprints"
            );
            assert_eq!(
                grid.is_protected(pos),
                piled.contains(&pos),
                "protected flag at {pos} disagrees with its piles"
            );
        }
    }

    let timers = sim.timers();
    let last_tick = timers.next_tick_ms() - timers.period_ms();
    if let Some(overdue) = sim
        .objects
        .queue()
        .pending()
        .into_iter()
        .find(|e| e.fire_time_ms < last_tick)
    {
        panic!("event {overdue:?} missed the timer boundary at {last_tick} ms");
    }
}

/// One participant of a lockstep session.
pub struct TestPeer {
    pub name: String,
    pub sim: SimState,
}

impl TestPeer {
    pub fn start(name: &str, seed: u64, config: &GameConfig) -> Self {
        let sim = SimState::with_config(seed, config.clone()).expect("test config must be valid");
        Self {
            name: name.to_string(),
            sim,
        }
    }

    /// Decode a turn's command payloads and step to the turn target.
    pub fn apply_turn_payloads(&mut self, target_ms: u64, payloads: &[Vec<u8>]) -> StepResult {
        let commands: Vec<SimCommand> = payloads
            .iter()
            .map(|p| serde_json::from_slice(p).expect("payload must decode"))
            .collect();
        self.sim.step(&commands, target_ms)
    }

    pub fn snapshot(&self) -> String {
        self.sim.to_json().expect("snapshot must serialize")
    }

    /// Save and immediately load this peer, as a player rejoining from a
    /// save file would.
    pub fn save_and_reload(&mut self) {
        let json = self.snapshot();
        self.sim = SimState::from_json(&json).expect("snapshot must load");
        assert_map_invariants(&self.sim);
    }
}

/// Several peers fed one canonical command stream in fixed-length turns.
pub struct LockstepSession {
    pub peers: Vec<TestPeer>,
    turn_ms: u64,
    now_ms: u64,
    pending: Vec<SimCommand>,
    /// Per-turn step results of the first peer, for inspection.
    pub last_result: Option<StepResult>,
}

impl LockstepSession {
    pub fn new(seed: u64, config: &GameConfig, names: &[&str], turn_ms: u64) -> Self {
        let peers = names
            .iter()
            .map(|name| TestPeer::start(name, seed, config))
            .collect();
        Self {
            peers,
            turn_ms,
            now_ms: 0,
            pending: Vec::new(),
            last_result: None,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Queue an action for the next turn. It applies at the turn's start.
    pub fn submit(&mut self, player: PlayerId, action: SimAction) {
        self.pending.push(SimCommand {
            player,
            time_ms: self.now_ms,
            action,
        });
    }

    /// Broadcast the pending commands and advance every peer one turn.
    pub fn run_turn(&mut self) {
        let payloads: Vec<Vec<u8>> = self
            .pending
            .drain(..)
            .map(|c| serde_json::to_vec(&c).expect("command must serialize"))
            .collect();
        let target = self.now_ms + self.turn_ms;
        debug!(target, commands = payloads.len(), "lockstep turn");

        let mut first = None;
        for peer in &mut self.peers {
            let result = peer.apply_turn_payloads(target, &payloads);
            assert_map_invariants(&peer.sim);
            first.get_or_insert(result);
        }
        self.last_result = first;
        self.now_ms = target;
    }

    /// Run turns until the session clock reaches `until_ms`.
    pub fn run_until(&mut self, until_ms: u64) {
        while self.now_ms < until_ms {
            self.run_turn();
        }
    }

    /// Assert every peer's snapshot is byte-identical; returns it.
    pub fn assert_in_sync(&self) -> String {
        let reference = self.peers[0].snapshot();
        for peer in &self.peers[1..] {
            assert_eq!(
                reference,
                peer.snapshot(),
                "peer {} diverged from {} at {} ms",
                peer.name,
                self.peers[0].name,
                self.now_ms
            );
        }
        reference
    }
}
