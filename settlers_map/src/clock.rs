// Logical clock and the periodic timer service.
//
// `SimulationClock` is the synchronized game time in logical milliseconds.
// It only moves when the sim driver advances it to the next canonical step
// time, so every peer reads the same value at the same point in the command
// stream. Scheduling converts relative seconds into absolute clock readings
// with `secs_to_millis`.
//
// `TimerRegistry` is the fixed-cadence tick service. Clients register once
// (the objects manager does so when the sim is built or reloaded), and the
// driver asks `due_ticks(now)` for every cadence boundary elapsed since the
// previous call. Registering or unregistering twice is harmless.
//
// The registry is transient: it is rebuilt from the clock on load (see
// `SimState::rebuild_transient_state`), which re-registers the manager and
// resumes ticking on the next boundary after the restored time.
//
// **Critical constraint: determinism.** Nothing here reads wall-clock time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The shared logical game clock, in milliseconds since session start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    now_ms: u64,
}

impl SimulationClock {
    pub const fn current_time_millis(&self) -> u64 {
        self.now_ms
    }

    /// Move the clock forward. Earlier readings are ignored so the clock is
    /// monotonically non-decreasing.
    pub fn advance_to(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Absolute time `secs` seconds from now.
    pub fn after_secs(&self, secs: f32) -> u64 {
        self.now_ms.saturating_add(secs_to_millis(secs))
    }
}

/// Convert a relative duration to whole logical milliseconds, truncating.
/// Negative or NaN durations collapse to zero.
pub fn secs_to_millis(secs: f32) -> u64 {
    (secs * 1000.0) as u64
}

/// Components that receive periodic timer callbacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerClient {
    MapObjects,
}

/// Fixed-cadence tick registry.
#[derive(Clone, Debug)]
pub struct TimerRegistry {
    period_ms: u64,
    last_tick_ms: u64,
    clients: BTreeSet<TimerClient>,
}

// Placeholder left by deserialization until `rebuild_transient_state` runs.
impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl TimerRegistry {
    /// A registry whose most recent boundary is the last one at or before
    /// `now_ms`, so the next tick is strictly in the future.
    pub fn new(period_ms: u64, now_ms: u64) -> Self {
        let period_ms = period_ms.max(1);
        Self {
            period_ms,
            last_tick_ms: now_ms - now_ms % period_ms,
            clients: BTreeSet::new(),
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Returns `true` if the client was not registered before.
    pub fn register(&mut self, client: TimerClient) -> bool {
        self.clients.insert(client)
    }

    /// Returns `true` if the client was registered.
    pub fn unregister(&mut self, client: TimerClient) -> bool {
        self.clients.remove(&client)
    }

    pub fn is_registered(&self, client: TimerClient) -> bool {
        self.clients.contains(&client)
    }

    /// Registered clients in deterministic order.
    pub fn clients(&self) -> impl Iterator<Item = TimerClient> + '_ {
        self.clients.iter().copied()
    }

    /// The next cadence boundary that has not fired yet.
    pub fn next_tick_ms(&self) -> u64 {
        self.last_tick_ms + self.period_ms
    }

    /// Every boundary in `(last, now_ms]`, consumed in ascending order.
    pub fn due_ticks(&mut self, now_ms: u64) -> Vec<u64> {
        let mut ticks = Vec::new();
        while self.next_tick_ms() <= now_ms {
            self.last_tick_ms = self.next_tick_ms();
            ticks.push(self.last_tick_ms);
        }
        ticks
    }
}
