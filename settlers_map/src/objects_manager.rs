// The map-objects manager: creation, cutting, piles, and the timed drain.
//
// `MapObjectsManager` owns everything the object lifecycles touch: the grid,
// the `EventQueue`, the logical clock, the RNG, the config, and the pile
// ledger. All gameplay entry points are synchronous methods on it; anything
// timed is expressed as `TimeEvent`s that the periodic timer later drains
// through `timer_event()`.
//
// ## Scheduling
//
// `schedule(target, secs, removal)` enqueues an event at
// `now + secs_to_millis(secs)`. Creation operations enqueue the events of the
// object's whole lifecycle up front (see the table in `map_object.rs`):
//
//   plant_tree:  grow after tree.growth
//   plant_corn:  grow after G, decompose after G+D, remove after G+D+R
//   add_arrow:   land after flight, remove after flight + min * (1 + jitter)
//   self-deleting objects, resource signs: one removal
//
// External actions (cut, harvest) enqueue new events and never touch queued
// ones. Events that fire after their target changed phase or disappeared are
// absorbed and traced.
//
// ## Search types
//
// Workers report what they found as a `SearchType` plus the tile they stand
// on. `execute_search_type` maps that to the tile actually acted on: adult
// trees are cut one tile up-left of the worker, stones one tile down-left,
// trees are planted one tile below, corn is handled in place.
//
// ## Narrative output
//
// Placements, removals, growth, and landed arrows are collected as
// `MapEvent`s; `take_events()` hands them to the caller. They are not part of
// the saved state.
//
// See also: `placement.rs` and `stack.rs` for the grid mutations, `sim.rs`
// for the driver that calls `timer_event()` on each timer boundary.
//
// **Critical constraint: determinism.** Object IDs come from a sequential
// counter and the only randomness is the injected `DeterministicRng`.

use crate::clock::SimulationClock;
use crate::config::GameConfig;
use crate::event::{EventQueue, MapEvent, MapEventKind, TimeEvent};
use crate::grid::{MAX_RESOURCE_AMOUNT, MapObjectsGrid, TileGrid};
use crate::map_object::{
    Arrow, ArrowPhase, CornPhase, Footprint, MapObject, MapObjectKind, ObjectState, PlainKind,
    Transition, TreePhase,
};
use crate::placement;
use crate::stack::StackLedger;
use crate::types::{
    LandscapeType, MaterialType, ObjectId, ObjectRef, PlayerId, SearchType, TilePos,
};
use serde::{Deserialize, Serialize};
use settlers_prng::{DeterministicRng, GameRng};
use tracing::{debug, trace};

/// Owner of all map objects and their scheduled lifecycle events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MapObjectsManager<G = TileGrid, R = GameRng> {
    grid: G,
    queue: EventQueue,
    clock: SimulationClock,
    rng: R,
    config: GameConfig,
    stacks: StackLedger,
    next_object_id: u64,
    #[serde(skip)]
    events: Vec<MapEvent>,
}

impl<G: MapObjectsGrid, R: DeterministicRng> MapObjectsManager<G, R> {
    /// A manager starting at logical time 0.
    pub fn new(grid: G, config: GameConfig, rng: R) -> Self {
        let stacks = StackLedger::new(config.stack_size);
        Self {
            grid,
            queue: EventQueue::new(),
            clock: SimulationClock::default(),
            rng,
            config,
            stacks,
            next_object_id: 0,
            events: Vec::new(),
        }
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut G {
        &mut self.grid
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.current_time_millis()
    }

    /// Move the logical clock forward without draining. Commands are applied
    /// at their own timestamp, so the driver calls this before each one.
    pub fn advance_clock(&mut self, now_ms: u64) {
        self.clock.advance_to(now_ms);
    }

    /// Narrative events collected since the last call.
    pub fn take_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Scheduling and the timer drain
    // -----------------------------------------------------------------------

    /// Enqueue a lifecycle step or removal `secs` seconds from now.
    pub fn schedule(&mut self, target: ObjectRef, secs: f32, removal: bool) {
        let fire_time = self.clock.after_secs(secs);
        self.queue.schedule_at(fire_time, target, removal);
    }

    /// Timer callback: advance the clock to `now_ms` and process every due
    /// event in `(fire_time, sequence)` order. Returns how many fired.
    pub fn timer_event(&mut self, now_ms: u64) -> usize {
        self.clock.advance_to(now_ms);
        let now = self.clock.current_time_millis();
        let mut fired = 0;
        while let Some(event) = self.queue.pop_if_due(now) {
            fired += 1;
            trace!(
                now,
                fire_time = event.fire_time_ms,
                seq = event.sequence,
                target = %event.target.id,
                removal = event.removal,
                "time event"
            );
            self.process_event(event);
        }
        fired
    }

    fn process_event(&mut self, event: TimeEvent) {
        let ObjectRef { anchor, id } = event.target;
        if event.removal {
            if self.remove(anchor, id).is_none() {
                trace!(%id, %anchor, "stale removal, target already gone");
            }
            return;
        }

        let Some(object) = self.grid.object_mut(anchor, id) else {
            trace!(%id, %anchor, "stale transition, target already gone");
            return;
        };
        let Some(transition) = object.change_state() else {
            trace!(%id, %anchor, kind = ?object.kind(), "stale transition absorbed");
            return;
        };
        let kind = match transition {
            Transition::TreeGrown => MapEventKind::TreeGrown { pos: anchor },
            Transition::CornGrown => MapEventKind::CornGrown { pos: anchor },
            Transition::CornDecomposing => MapEventKind::CornDecomposing { pos: anchor },
            Transition::ArrowLanded {
                target,
                player,
                hit_strength,
            } => MapEventKind::ArrowLanded {
                target,
                player,
                hit_strength,
            },
        };
        self.emit(kind);
    }

    // -----------------------------------------------------------------------
    // Search-type dispatch
    // -----------------------------------------------------------------------

    /// Act on what a worker standing at `pos` found.
    pub fn execute_search_type(&mut self, pos: TilePos, search: SearchType) -> bool {
        match search {
            SearchType::CuttableTree => self.cut_tree(pos.offset(-1, -1)),
            SearchType::CuttableStone => {
                self.cut_stone(pos.offset(-1, 1), pos);
                true
            }
            SearchType::PlantableTree => self.plant_tree(pos.offset(0, 1)),
            SearchType::CuttableCorn => self.cut_corn(pos),
            SearchType::PlantableCorn => self.plant_corn(pos),
            SearchType::ResourceSignable => self.add_resource_sign(pos),
        }
    }

    // -----------------------------------------------------------------------
    // Trees, corn, stones
    // -----------------------------------------------------------------------

    /// Plant a growing tree. It becomes cuttable after `tree.growth`.
    pub fn plant_tree(&mut self, pos: TilePos) -> bool {
        let Some(target) = self.place(pos, ObjectState::Tree(TreePhase::Growing)) else {
            return false;
        };
        self.schedule(target, self.config.tree.growth_duration_secs, false);
        true
    }

    /// Place an already adult tree, as found on a freshly loaded map.
    pub fn plant_adult_tree(&mut self, pos: TilePos) -> bool {
        self.place(pos, ObjectState::Tree(TreePhase::Adult)).is_some()
    }

    /// Cut the adult tree anchored at `pos`. The trunk lies for
    /// `tree.decompose` before it is removed.
    pub fn cut_tree(&mut self, pos: TilePos) -> bool {
        let Some(tree) = self.grid.object_of_kind_mut(pos, MapObjectKind::TreeAdult) else {
            return false;
        };
        if !tree.cut_off() {
            return false;
        }
        let target = tree.object_ref();
        self.schedule(target, self.config.tree.decompose_duration_secs, true);
        true
    }

    /// Plant corn at `pos`. The anchor and its in-bounds neighbours turn to
    /// earth first, whether or not the corn itself fits.
    pub fn plant_corn(&mut self, pos: TilePos) -> bool {
        self.grid.set_landscape(pos, LandscapeType::Earth);
        for neighbour in pos.hex_neighbours() {
            if self.grid.is_in_bounds(neighbour) {
                self.grid.set_landscape(neighbour, LandscapeType::Earth);
            }
        }

        let Some(target) = self.place(pos, ObjectState::Corn(CornPhase::Growing)) else {
            return false;
        };
        let corn = &self.config.corn;
        let grown = corn.growth_duration_secs;
        let decomposing = grown + corn.decompose_duration_secs;
        let removed = decomposing + corn.remove_duration_secs;
        self.schedule(target, grown, false);
        self.schedule(target, decomposing, false);
        self.schedule(target, removed, true);
        true
    }

    /// Harvest the adult corn at `pos`; it is removed after `corn.remove`.
    pub fn cut_corn(&mut self, pos: TilePos) -> bool {
        let Some(corn) = self.grid.object_of_kind_mut(pos, MapObjectKind::CornAdult) else {
            return false;
        };
        if !corn.cut_off() {
            return false;
        }
        let target = corn.object_ref();
        self.schedule(target, self.config.corn.remove_duration_secs, true);
        true
    }

    /// Place a stone deposit. Capacities above `max_stone_size` are clamped.
    pub fn add_stone(&mut self, pos: TilePos, capacity: u8) -> bool {
        let capacity = capacity.min(self.config.max_stone_size);
        self.place(pos, ObjectState::Stone { capacity }).is_some()
    }

    /// Take one unit from the stone at `stone_pos`. When it is used up the
    /// stone disappears and its remains are left at `remains_pos` for
    /// `stone.decompose_delay`.
    pub fn cut_stone(&mut self, stone_pos: TilePos, remains_pos: TilePos) {
        let Some(stone) = self.grid.object_of_kind_mut(stone_pos, MapObjectKind::Stone) else {
            debug!(%stone_pos, "no stone to cut");
            return;
        };
        stone.cut_off();
        if stone.can_be_cut() {
            return;
        }

        let delay = self.config.stone.decompose_delay_secs;
        self.add_self_deleting(remains_pos, PlainKind::CutOffStone, delay, None);
        self.remove_kind(stone_pos, MapObjectKind::Stone);
        self.emit(MapEventKind::StoneDepleted { pos: stone_pos });
    }

    // -----------------------------------------------------------------------
    // Transient markers
    // -----------------------------------------------------------------------

    /// Mark the underground resource at `pos` for `resource_sign.lifetime`.
    pub fn add_resource_sign(&mut self, pos: TilePos) -> bool {
        let resource = self.grid.resource_type_at(pos);
        let amount =
            f32::from(self.grid.resource_amount_at(pos)) / f32::from(MAX_RESOURCE_AMOUNT);
        let Some(target) = self.place(pos, ObjectState::ResourceSign { resource, amount }) else {
            return false;
        };
        self.schedule(target, self.config.resource_sign.lifetime_secs, true);
        true
    }

    /// Launch an arrow from `shooter` at `attacked`. It lands after the
    /// flight time and is removed after a jittered delay.
    pub fn add_arrow(
        &mut self,
        attacked: TilePos,
        shooter: TilePos,
        player: PlayerId,
        hit_strength: f32,
    ) -> bool {
        let arrow = Arrow {
            phase: ArrowPhase::Flying,
            shooter,
            player,
            hit_strength,
        };
        let Some(target) = self.place(attacked, ObjectState::Arrow(arrow)) else {
            return false;
        };
        let params = &self.config.arrow;
        let flight = attacked.hex_distance(shooter) as f32 / params.flight_tiles_per_sec;
        let min_delay = params.min_decompose_delay_secs;
        let linger = min_delay * (1.0 + self.rng.next_f32());
        self.schedule(target, flight, false);
        self.schedule(target, flight + linger, true);
        true
    }

    /// Place an object that removes itself after `duration_secs`. Ghosts and
    /// deconstruction smoke are flagged as soundable.
    pub fn add_self_deleting(
        &mut self,
        pos: TilePos,
        kind: PlainKind,
        duration_secs: f32,
        player: Option<PlayerId>,
    ) -> bool {
        let state = ObjectState::SelfDeleting {
            kind,
            duration_secs,
            player,
            soundable: kind.is_soundable(),
        };
        let Some(target) = self.place(pos, state) else {
            return false;
        };
        self.schedule(target, duration_secs, true);
        true
    }

    /// The ghost left behind by a dead settler.
    pub fn add_ghost(&mut self, pos: TilePos, player: PlayerId) -> bool {
        let duration = self.config.ghost_duration_secs;
        self.add_self_deleting(pos, PlainKind::Ghost, duration, Some(player))
    }

    /// Non-negative values add or update the tile's construction mark;
    /// negative values remove it.
    pub fn set_construction_marking(&mut self, pos: TilePos, value: i8) {
        let Ok(value) = u8::try_from(value) else {
            self.remove_kind(pos, MapObjectKind::ConstructionMark);
            return;
        };
        if let Some(MapObject {
            state: ObjectState::ConstructionMark { value: current },
            ..
        }) = self.grid.object_of_kind_mut(pos, MapObjectKind::ConstructionMark)
        {
            *current = value;
            return;
        }
        self.place(pos, ObjectState::ConstructionMark { value });
    }

    pub fn add_building_work_area(&mut self, pos: TilePos, radius: f32) -> bool {
        self.place(pos, ObjectState::BuildingWorkArea { radius }).is_some()
    }

    // -----------------------------------------------------------------------
    // Static objects
    // -----------------------------------------------------------------------

    pub fn add_simple_object(
        &mut self,
        pos: TilePos,
        kind: PlainKind,
        blocking: bool,
        player: Option<PlayerId>,
    ) -> bool {
        let state = ObjectState::Standard {
            kind,
            blocking,
            player,
        };
        self.place(pos, state).is_some()
    }

    pub fn add_building(&mut self, pos: TilePos, footprint: Footprint, player: PlayerId) -> bool {
        self.place(pos, ObjectState::Building { player, footprint })
            .is_some()
    }

    pub fn add_attackable_tower(
        &mut self,
        pos: TilePos,
        footprint: Footprint,
        player: PlayerId,
    ) -> bool {
        self.place(pos, ObjectState::AttackableTower { player, footprint })
            .is_some()
    }

    /// Decorative waves. Decorations never block and are not announced.
    pub fn add_waves(&mut self, pos: TilePos) {
        self.add_decoration(pos, PlainKind::Waves);
    }

    pub fn add_fish(&mut self, pos: TilePos) {
        self.add_decoration(pos, PlainKind::FishDecoration);
    }

    fn add_decoration(&mut self, pos: TilePos, kind: PlainKind) {
        if !self.grid.is_in_bounds(pos) {
            return;
        }
        let id = self.next_id();
        placement::add_unchecked(&mut self.grid, MapObject::new(id, pos, ObjectState::Decoration(kind)));
    }

    /// Put a pig on `pos` (if none is there) or take it away.
    pub fn place_pig(&mut self, pos: TilePos, place: bool) {
        if !place {
            self.remove_kind(pos, MapObjectKind::Pig);
        } else if !self.is_pig_there(pos) {
            self.place(pos, ObjectState::Pig);
        }
    }

    pub fn is_pig_there(&self, pos: TilePos) -> bool {
        self.grid.object_of_kind(pos, MapObjectKind::Pig).is_some()
    }

    pub fn is_pig_adult(&self, pos: TilePos) -> bool {
        self.grid
            .object_of_kind(pos, MapObjectKind::Pig)
            .is_some_and(MapObject::can_be_cut)
    }

    /// Remove the first object of `kind` at `pos`, unblocking its footprint.
    /// A removed pile goes through the ledger so the tile loses its
    /// protection with its last pile.
    pub fn remove_object_of_kind(&mut self, pos: TilePos, kind: MapObjectKind) -> bool {
        if kind != MapObjectKind::Stack {
            return self.remove_kind(pos, kind).is_some();
        }
        let Some(removed) = self.stacks.remove_first_pile(&mut self.grid, pos) else {
            return false;
        };
        self.emit_removed(&removed);
        true
    }

    // -----------------------------------------------------------------------
    // Piles
    // -----------------------------------------------------------------------

    pub fn can_push(&self, pos: TilePos) -> bool {
        self.stacks.can_push(&self.grid, pos)
    }

    pub fn push_material(&mut self, pos: TilePos, material: MaterialType) -> bool {
        let next_object_id = &mut self.next_object_id;
        self.stacks.push_material(&mut self.grid, pos, material, || {
            *next_object_id += 1;
            ObjectId(*next_object_id)
        })
    }

    pub fn pop_material(&mut self, pos: TilePos, material: Option<MaterialType>) -> Option<MaterialType> {
        self.stacks.pop_material(&mut self.grid, pos, material)
    }

    pub fn steal_material_at(&mut self, pos: TilePos) -> Option<MaterialType> {
        let stolen = self.stacks.steal_material_at(&mut self.grid, pos)?;
        self.emit(MapEventKind::MaterialStolen {
            pos,
            material: stolen,
        });
        Some(stolen)
    }

    pub fn mark_stolen(&mut self, pos: TilePos) -> bool {
        self.stacks.mark_stolen(&mut self.grid, pos)
    }

    pub fn unmark_stolen(&mut self, pos: TilePos) -> bool {
        self.stacks.unmark_stolen(&mut self.grid, pos)
    }

    pub fn can_pop(&self, pos: TilePos, material: Option<MaterialType>) -> bool {
        self.stacks.can_pop(&self.grid, pos, material)
    }

    pub fn stack_size(&self, pos: TilePos, material: Option<MaterialType>) -> u8 {
        self.stacks.stack_size(&self.grid, pos, material)
    }

    pub fn material_type_at(&self, pos: TilePos) -> Option<MaterialType> {
        self.stacks.material_type_at(&self.grid, pos)
    }

    pub fn has_stealable_material(&self, pos: TilePos) -> bool {
        self.stacks.has_stealable_material(&self.grid, pos)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn next_id(&mut self) -> ObjectId {
        self.next_object_id += 1;
        ObjectId(self.next_object_id)
    }

    /// Allocate an ID and try to place a new object. On success returns the
    /// reference its events should target.
    fn place(&mut self, pos: TilePos, state: ObjectState) -> Option<ObjectRef> {
        let object = MapObject::new(self.next_id(), pos, state);
        let target = object.object_ref();
        let kind = object.kind();
        if !placement::try_place(&mut self.grid, object) {
            return None;
        }
        self.emit(MapEventKind::ObjectPlaced {
            id: target.id,
            kind,
            pos,
        });
        Some(target)
    }

    fn remove(&mut self, anchor: TilePos, id: ObjectId) -> Option<MapObject> {
        let removed = placement::remove_object(&mut self.grid, anchor, id)?;
        self.emit_removed(&removed);
        Some(removed)
    }

    fn remove_kind(&mut self, anchor: TilePos, kind: MapObjectKind) -> Option<MapObject> {
        let removed = placement::remove_object_of_kind(&mut self.grid, anchor, kind)?;
        self.emit_removed(&removed);
        Some(removed)
    }

    fn emit_removed(&mut self, removed: &MapObject) {
        self.emit(MapEventKind::ObjectRemoved {
            id: removed.id,
            kind: removed.kind(),
            pos: removed.anchor,
        });
    }

    fn emit(&mut self, kind: MapEventKind) {
        self.events.push(MapEvent {
            time_ms: self.clock.current_time_millis(),
            kind,
        });
    }
}
