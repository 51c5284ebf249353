//! Per-vehicle motion state.
//!
//! Motion runs on the render clock: every frame a vehicle adds
//! `speed * dt / route_length` to its progress, pauses when it reaches its
//! next stop, and retires when progress hits 1. Stops are served strictly
//! in path order; a stop already served never pauses the vehicle again.

use std::collections::HashSet;
use std::sync::Arc;

use geo::Point;
use headway_transit::identifiers::{StopIdentifier, VehicleIdentifier};
use headway_transit::models::types::TravelDirection;
use headway_transit::snapshot::Stop;
use headway_transit::spatial::queries::haversine_distance;
use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::config::SimTuning;
use crate::geometry::RoutePath;

// ============================================================================
// Stop Marks
// ============================================================================

/// A stop pinned to its fraction along the drawn path.
#[derive(Clone, Debug)]
pub struct StopMark {
    pub stop: Arc<Stop>,
    pub fraction: f64,
}

/// Project each stop onto the path once, in travel order.
pub fn mark_stops(path: &RoutePath, stops: &[Arc<Stop>]) -> Vec<StopMark> {
    stops
        .iter()
        .map(|stop| StopMark {
            fraction: path.progress_near(stop.location),
            stop: stop.clone(),
        })
        .collect()
}

// ============================================================================
// Motion State
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionPhase {
    Running,
    Paused,
    Completed,
}

#[derive(Clone, Debug)]
pub struct VehicleMotion {
    id: VehicleIdentifier,
    direction: TravelDirection,
    progress: f64,
    speed_mps: f64,
    position: Point,
    /// Render timestamp the current hold ends at; 0 when not paused.
    pause_until_ms: f64,
    last_traffic_check_ms: f64,
    visited: HashSet<StopIdentifier>,
    /// Index into the stop marks of the next stop to serve.
    next_stop_ix: usize,
    completed: bool,
}

impl VehicleMotion {
    /// Place a vehicle on the path.
    ///
    /// With a non-zero `initial_progress` the vehicle starts mid-trip, so
    /// every stop already behind it counts as served and only the remaining
    /// ones can pause it.
    pub fn spawn(
        id: VehicleIdentifier,
        direction: TravelDirection,
        path: &RoutePath,
        marks: &[StopMark],
        initial_progress: f64,
        speed_mps: f64,
        now_ms: f64,
    ) -> Self {
        let progress = if initial_progress.is_finite() {
            initial_progress.clamp(0.0, 1.0)
        } else {
            0.0
        };

        let mut visited = HashSet::new();
        let mut next_stop_ix = 0;
        for mark in marks {
            if mark.fraction < progress - 1e-9 {
                visited.insert(mark.stop.id.clone());
                next_stop_ix += 1;
            } else {
                break;
            }
        }

        Self {
            id,
            direction,
            progress,
            speed_mps,
            position: path.point_at_progress(progress),
            pause_until_ms: 0.0,
            last_traffic_check_ms: now_ms,
            visited,
            next_stop_ix,
            completed: false,
        }
    }

    /// Advance one render frame of `dt_seconds`.
    ///
    /// `traffic` enables the random traffic holds; only road vehicles get
    /// those.
    pub fn advance(
        &mut self,
        path: &RoutePath,
        marks: &[StopMark],
        tuning: &SimTuning,
        traffic: bool,
        now_ms: f64,
        dt_seconds: f64,
        rng: &mut StdRng,
    ) {
        if self.completed {
            return;
        }
        if now_ms < self.pause_until_ms {
            // Held at a stop or in traffic, position frozen
            return;
        }

        let length = path.length_meters();
        if length > 0.0 {
            self.progress += self.speed_mps * dt_seconds / length;
        } else {
            self.progress = 1.0;
        }
        if self.progress >= 1.0 {
            self.progress = 1.0;
            self.position = path.point_at_progress(1.0);
            self.completed = true;
            debug!(vehicle = %self.id, "trip completed");
            return;
        }
        self.position = path.point_at_progress(self.progress);

        // One stop radius expressed in progress units
        let passed_margin = if length > 0.0 {
            tuning.stop_radius_m / length
        } else {
            0.0
        };
        self.serve_next_stop(marks, tuning, now_ms, passed_margin);

        if traffic {
            self.roll_for_traffic(tuning, now_ms, rng);
        }
    }

    /// Check only the next unserved stop. Arriving snaps the displayed
    /// position onto the stop and holds there for the dwell time. A stop
    /// overshot between frames (render hitch) is consumed without a hold so
    /// the ones after it stay reachable.
    fn serve_next_stop(
        &mut self,
        marks: &[StopMark],
        tuning: &SimTuning,
        now_ms: f64,
        passed_margin: f64,
    ) {
        while self.next_stop_ix < marks.len() {
            let mark = &marks[self.next_stop_ix];
            if self.visited.contains(&mark.stop.id) {
                self.next_stop_ix += 1;
                continue;
            }
            if haversine_distance(self.position, mark.stop.location) < tuning.stop_radius_m {
                self.position = mark.stop.location;
                self.pause_until_ms = now_ms + tuning.dwell_ms as f64;
                self.visited.insert(mark.stop.id.clone());
                self.next_stop_ix += 1;
                return;
            }
            if self.progress > mark.fraction + passed_margin {
                debug!(vehicle = %self.id, stop = %mark.stop.id, "stop overshot between frames");
                self.visited.insert(mark.stop.id.clone());
                self.next_stop_ix += 1;
                continue;
            }
            return;
        }
    }

    fn roll_for_traffic(&mut self, tuning: &SimTuning, now_ms: f64, rng: &mut StdRng) {
        if tuning.traffic_pause_probability <= 0.0 {
            return;
        }
        if now_ms - self.last_traffic_check_ms <= tuning.traffic_check_interval_ms as f64 {
            return;
        }
        self.last_traffic_check_ms = now_ms;
        if rng.random::<f64>() < tuning.traffic_pause_probability {
            let min = tuning.traffic_pause_min_ms;
            let max = tuning.traffic_pause_max_ms.max(min);
            let hold = rng.random_range(min..=max);
            self.pause_until_ms = now_ms + hold as f64;
            debug!(vehicle = %self.id, hold_ms = hold, "held in traffic");
        }
    }

    pub fn id(&self) -> &VehicleIdentifier {
        &self.id
    }

    pub fn direction(&self) -> TravelDirection {
        self.direction
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn speed_mps(&self) -> f64 {
        self.speed_mps
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_paused(&self, now_ms: f64) -> bool {
        !self.completed && now_ms < self.pause_until_ms
    }

    pub fn phase(&self, now_ms: f64) -> MotionPhase {
        if self.completed {
            MotionPhase::Completed
        } else if now_ms < self.pause_until_ms {
            MotionPhase::Paused
        } else {
            MotionPhase::Running
        }
    }

    pub fn visited_stops(&self) -> &HashSet<StopIdentifier> {
        &self.visited
    }
}
