//! Virtual clock running faster than wall time.
//!
//! The clock is defined by an anchor pair: a real timestamp and the virtual
//! timestamp it maps to. Virtual "now" is the anchor plus scaled real elapsed
//! time, so the mapping survives restarts as long as the anchors do. Service
//! runs from 06:00; whenever the virtual time lands in the dead window between
//! midnight and 06:00 the clock re-anchors itself to 06:00 of that day and
//! persists the new anchors.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Hour of day service starts. Virtual time never shows earlier than this.
pub const SERVICE_DAY_START_HOUR: u32 = 6;

fn service_day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(SERVICE_DAY_START_HOUR, 0, 0)
        .unwrap_or(NaiveTime::MIN)
}

fn millis_to_naive(ms: i64) -> NaiveDateTime {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

fn naive_to_millis(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_millis()
}

/// Minutes since midnight of a virtual timestamp.
pub fn minutes_of_day(dt: NaiveDateTime) -> u32 {
    dt.time().hour() * 60 + dt.time().minute()
}

// ============================================================================
// Anchors
// ============================================================================

/// The persisted real/virtual timestamp pair the clock extrapolates from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockAnchors {
    pub real_epoch_ms: i64,
    pub sim_epoch_ms: i64,
}

impl ClockAnchors {
    /// Pin a real timestamp to a virtual datetime.
    pub fn at(real_epoch_ms: i64, sim: NaiveDateTime) -> Self {
        Self {
            real_epoch_ms,
            sim_epoch_ms: naive_to_millis(sim),
        }
    }

    /// First-use anchors: virtual time starts at the most recent 06:00.
    ///
    /// Before 06:00 local that is yesterday's 06:00, so the virtual day is
    /// already well underway instead of hours away from opening.
    pub fn derive(real_epoch_ms: i64, local_now: NaiveDateTime) -> Self {
        let start = service_day_start();
        let sim = if local_now.time() < start {
            (local_now.date() - chrono::Days::new(1)).and_time(start)
        } else {
            local_now.date().and_time(start)
        };
        Self::at(real_epoch_ms, sim)
    }

    pub fn sim_datetime(&self) -> NaiveDateTime {
        millis_to_naive(self.sim_epoch_ms)
    }
}

// ============================================================================
// Anchor Persistence
// ============================================================================

/// Where the clock keeps its anchors between runs.
pub trait AnchorStore: Send + Sync {
    fn load(&self) -> Option<ClockAnchors>;
    fn save(&self, anchors: &ClockAnchors);
}

/// Keeps anchors for the life of the process. Handy for tests and for app
/// shells that bring their own persistence at a higher layer.
#[derive(Default)]
pub struct MemoryAnchorStore {
    slot: Mutex<Option<ClockAnchors>>,
}

impl MemoryAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnchorStore for MemoryAnchorStore {
    fn load(&self) -> Option<ClockAnchors> {
        self.slot.lock().ok().and_then(|slot| *slot)
    }

    fn save(&self, anchors: &ClockAnchors) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(*anchors);
        }
    }
}

// ============================================================================
// Virtual Clock
// ============================================================================

pub struct VirtualClock {
    anchors: ClockAnchors,
    speed: f64,
    store: Option<Arc<dyn AnchorStore>>,
}

impl VirtualClock {
    /// Open the clock, restoring anchors from the store or deriving fresh
    /// ones from the wall clock.
    pub fn new(speed: f64, store: Option<Arc<dyn AnchorStore>>) -> Self {
        let real_now = Utc::now().timestamp_millis();
        let anchors = store
            .as_ref()
            .and_then(|s| s.load())
            .unwrap_or_else(|| {
                let anchors = ClockAnchors::derive(real_now, Local::now().naive_local());
                if let Some(s) = &store {
                    s.save(&anchors);
                }
                anchors
            });
        Self { anchors, speed, store }
    }

    /// A clock with explicit anchors and no persistence.
    pub fn anchored(anchors: ClockAnchors, speed: f64) -> Self {
        Self {
            anchors,
            speed,
            store: None,
        }
    }

    /// Current virtual time.
    pub fn now(&mut self) -> NaiveDateTime {
        self.now_at(Utc::now().timestamp_millis())
    }

    /// Virtual time at a given real timestamp.
    ///
    /// This is the whole clock: headless drivers feed it a synthetic real
    /// timeline and get a fully deterministic virtual one back. Takes
    /// `&mut self` because crossing midnight re-anchors the clock.
    pub fn now_at(&mut self, real_epoch_ms: i64) -> NaiveDateTime {
        let real_elapsed = (real_epoch_ms - self.anchors.real_epoch_ms) as f64;
        let sim_ms = self.anchors.sim_epoch_ms + (real_elapsed * self.speed) as i64;
        let sim = millis_to_naive(sim_ms);

        if sim.time() < service_day_start() {
            // Dead window between midnight and 06:00: skip straight to the
            // start of this virtual day's service.
            let reset = sim.date().and_time(service_day_start());
            self.anchors = ClockAnchors::at(real_epoch_ms, reset);
            if let Some(store) = &self.store {
                store.save(&self.anchors);
            }
            info!(day = %reset.date(), "virtual day reset to service start");
            return reset;
        }
        sim
    }

    /// Current virtual time as "HH:MM:SS" for clock displays.
    pub fn formatted(&mut self) -> String {
        self.now().format("%H:%M:%S").to_string()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn anchors(&self) -> ClockAnchors {
        self.anchors
    }
}
