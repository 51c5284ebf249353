//! Headway-based departure expansion.
//!
//! A schedule says "every 15 minutes from 06:00 to 22:00". The scheduler
//! turns that into numbered departure slots and, given the virtual time,
//! says which slots are due to spawn a vehicle right now. A per-direction
//! ledger guarantees each slot spawns at most once no matter how often or
//! how irregularly the tick loop asks.

use std::collections::HashSet;

use headway_transit::models::types::Schedule;
use tracing::{debug, warn};

// ============================================================================
// Spawn Ledger
// ============================================================================

/// Which departure slots of one line-direction have already been handled.
///
/// The cursor counts how many slots have been consumed since the window
/// opened; the set double-checks individual indices so a slot can never be
/// emitted twice even if the cursor were disturbed.
#[derive(Clone, Debug, Default)]
pub struct SpawnLedger {
    next_index: u32,
    spawned: HashSet<u32>,
}

impl SpawnLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    pub fn is_spawned(&self, index: u32) -> bool {
        self.spawned.contains(&index)
    }

    pub fn mark_spawned(&mut self, index: u32) {
        self.spawned.insert(index);
        self.next_index = self.next_index.max(index + 1);
    }

    /// Forget everything. Slot indexing restarts at 0 when the service
    /// window next opens.
    pub fn reset(&mut self) {
        self.next_index = 0;
        self.spawned.clear();
    }

    fn is_empty(&self) -> bool {
        self.next_index == 0 && self.spawned.is_empty()
    }
}

// ============================================================================
// Due Slots
// ============================================================================

/// A departure slot that should spawn a vehicle this tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DueSlot {
    pub index: u32,
    /// Scheduled departure, minutes since midnight.
    pub departure_minute: u32,
    /// Where along the route the vehicle starts, 0 at the origin. A slot
    /// whose departure is already in the past spawns partway along instead
    /// of bunching at the origin.
    pub initial_progress: f64,
}

/// Expand the slots due at `now_minute` and record them in the ledger.
///
/// Slots whose whole trip would already be over (departure older than
/// `estimated_trip_minutes`) are consumed without being returned, so a
/// session opened mid-afternoon does not burst-spawn the whole morning.
pub fn due_slots(
    schedule: Option<&Schedule>,
    now_minute: u32,
    estimated_trip_minutes: f64,
    ledger: &mut SpawnLedger,
) -> Vec<DueSlot> {
    let Some(schedule) = schedule else {
        return Vec::new();
    };
    if schedule.headway_minutes == 0 {
        // Unreachable for parsed schedules, but a hand-built one must not
        // divide by zero here
        warn!("schedule with zero headway, no departures");
        return Vec::new();
    }

    let first = schedule.first_minute();
    let last = schedule.last_minute();
    if now_minute < first || now_minute > last {
        if !ledger.is_empty() {
            debug!(now_minute, "outside service window, ledger reset");
            ledger.reset();
        }
        return Vec::new();
    }

    let expected = (now_minute - first) / schedule.headway_minutes + 1;
    let mut due = Vec::new();
    for index in ledger.next_index()..expected {
        if ledger.is_spawned(index) {
            continue;
        }
        let departure_minute = first + index * schedule.headway_minutes;
        let elapsed = now_minute.saturating_sub(departure_minute) as f64;
        if elapsed > estimated_trip_minutes {
            // This trip already ran to completion off-screen
            debug!(index, departure_minute, "stale slot consumed without spawn");
            ledger.mark_spawned(index);
            continue;
        }
        let initial_progress = if estimated_trip_minutes > 0.0 {
            (elapsed / estimated_trip_minutes).clamp(0.0, 1.0)
        } else {
            0.0
        };
        due.push(DueSlot {
            index,
            departure_minute,
            initial_progress,
        });
        ledger.mark_spawned(index);
    }
    due
}
