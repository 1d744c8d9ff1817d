// Timed map-object events and player-visible narrative events.
//
// Objects with a timed lifecycle schedule `TimeEvent`s into a priority queue
// ordered by `(fire_time_ms, sequence)`. The periodic timer drains every event
// that is due, earliest first, and hands each to the objects manager, which
// either runs the target's lifecycle hook or removes the target.
//
// This file defines two related but distinct concepts:
// - `TimeEvent`: internal events in the priority queue that drive lifecycles.
// - `MapEvent`: narrative output (an arrow landed, a tree finished growing)
//   collected by the manager for the embedding game to consume.
//
// There is no cancellation. An event whose target was removed or already
// moved on is absorbed when it fires (see `map_object.rs`).
//
// The queue is serialized in pop order rather than heap layout, so two peers
// holding the same pending events produce identical snapshots no matter how
// each heap was built.
//
// See also: `objects_manager.rs` for scheduling and draining, `clock.rs` for
// the logical time the fire times are measured in.
//
// **Critical constraint: determinism.** Event ordering must be identical
// across all peers. The `(fire_time_ms, sequence)` key is a total order, and
// `sequence` survives save/load so FIFO order among equal fire times holds
// across a resume.

use crate::map_object::MapObjectKind;
use crate::types::{MaterialType, ObjectId, ObjectRef, PlayerId, TilePos};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

// ---------------------------------------------------------------------------
// Internal scheduled events (priority queue)
// ---------------------------------------------------------------------------

/// A lifecycle step scheduled for a specific map object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimeEvent {
    /// Logical time (ms) at which the event becomes due.
    pub fire_time_ms: u64,
    /// Insertion order; lower values fire first among equal fire times.
    pub sequence: u64,
    pub target: ObjectRef,
    /// Remove the target instead of advancing its lifecycle.
    pub removal: bool,
}

// We want a min-heap: lowest (fire_time_ms, sequence) fires first.
impl PartialEq for TimeEvent {
    fn eq(&self, other: &Self) -> bool {
        self.fire_time_ms == other.fire_time_ms && self.sequence == other.sequence
    }
}

impl Eq for TimeEvent {}

impl PartialOrd for TimeEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for BinaryHeap, which is a max-heap.
        other
            .fire_time_ms
            .cmp(&self.fire_time_ms)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Min-heap of pending `TimeEvent`s.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "QueueSnapshot", into = "QueueSnapshot")]
pub struct EventQueue {
    heap: BinaryHeap<TimeEvent>,
    next_sequence: u64,
}

/// Serialized form of `EventQueue`: pending events in pop order.
#[derive(Serialize, Deserialize)]
struct QueueSnapshot {
    pending: Vec<TimeEvent>,
    next_sequence: u64,
}

impl From<EventQueue> for QueueSnapshot {
    fn from(queue: EventQueue) -> Self {
        // `into_sorted_vec` is ascending by `Ord`, which is reversed here.
        let mut pending = queue.heap.into_sorted_vec();
        pending.reverse();
        Self {
            pending,
            next_sequence: queue.next_sequence,
        }
    }
}

impl From<QueueSnapshot> for EventQueue {
    fn from(snapshot: QueueSnapshot) -> Self {
        Self {
            heap: snapshot.pending.into_iter().collect(),
            next_sequence: snapshot.next_sequence,
        }
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event at an absolute logical time.
    pub fn schedule_at(&mut self, fire_time_ms: u64, target: ObjectRef, removal: bool) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(TimeEvent {
            fire_time_ms,
            sequence,
            target,
            removal,
        });
    }

    /// Fire time of the earliest pending event.
    pub fn peek_time(&self) -> Option<u64> {
        self.heap.peek().map(|e| e.fire_time_ms)
    }

    /// Pop the earliest event if it is due at `now_ms` (`fire_time <= now`).
    pub fn pop_if_due(&mut self, now_ms: u64) -> Option<TimeEvent> {
        if self.heap.peek().is_some_and(|e| e.fire_time_ms <= now_ms) {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Pending events in the order they will fire.
    pub fn pending(&self) -> Vec<&TimeEvent> {
        let mut events: Vec<&TimeEvent> = self.heap.iter().collect();
        events.sort_by(|a, b| b.cmp(a));
        events
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Narrative events (output)
// ---------------------------------------------------------------------------

/// Something that happened on the map, stamped with the logical time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapEvent {
    pub time_ms: u64,
    pub kind: MapEventKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MapEventKind {
    ObjectPlaced {
        id: ObjectId,
        kind: MapObjectKind,
        pos: TilePos,
    },
    ObjectRemoved {
        id: ObjectId,
        kind: MapObjectKind,
        pos: TilePos,
    },
    TreeGrown { pos: TilePos },
    CornGrown { pos: TilePos },
    CornDecomposing { pos: TilePos },
    /// Combat resolution belongs to the embedding game; this carries what it
    /// needs.
    ArrowLanded {
        target: TilePos,
        player: PlayerId,
        hit_strength: f32,
    },
    StoneDepleted { pos: TilePos },
    MaterialStolen {
        pos: TilePos,
        material: MaterialType,
    },
}
