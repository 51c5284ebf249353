//! One observed line-direction and its active vehicles.
//!
//! A session owns everything a line-direction needs to run: the resolved
//! stop sequence, the drawn path, the spawn ledger and the live vehicles.
//! Each frame it spawns due departures, advances every vehicle by the frame
//! dt, and retires trips finished on the previous frame.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Point;
use headway_transit::identifiers::{LineIdentifier, VehicleIdentifier};
use headway_transit::models::types::{Schedule, TransitMode, TravelDirection};
use headway_transit::snapshot::{Line, Stop};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::SimTuning;
use crate::geometry::{RoutePath, build_path};
use crate::routing::RouteProvider;
use crate::scheduler::{SpawnLedger, due_slots};
use crate::vehicle::{StopMark, VehicleMotion, mark_stops};

/// Snapshot of one vehicle for rendering and lists.
#[derive(Clone, Debug)]
pub struct VehicleView {
    pub id: VehicleIdentifier,
    pub line_id: LineIdentifier,
    pub line_number: Arc<str>,
    pub direction: TravelDirection,
    pub latitude: f64,
    pub longitude: f64,
    pub progress: f64,
    pub speed_mps: f64,
    pub paused: bool,
}

pub struct LineSession {
    line_id: LineIdentifier,
    line_number: Arc<str>,
    mode: TransitMode,
    direction: TravelDirection,
    schedule: Option<Schedule>,
    path: RoutePath,
    marks: Vec<StopMark>,
    estimated_trip_minutes: f64,
    ledger: SpawnLedger,
    vehicles: Vec<VehicleMotion>,
    rng: StdRng,
    render_clock_ms: f64,
    spawn_counter: u64,
}

impl LineSession {
    /// Resolve the path for one direction of a line.
    ///
    /// `stops` is the line's stop sequence in outbound order; inbound
    /// sessions traverse it back to front. Returns `None` when fewer than
    /// two stops resolve, since there is nothing to drive along.
    pub async fn build(
        line: &Line,
        direction: TravelDirection,
        stops: Vec<Arc<Stop>>,
        router: &dyn RouteProvider,
        tuning: &SimTuning,
        seed: Option<u64>,
    ) -> Option<Self> {
        let ordered: Vec<Arc<Stop>> = if direction.is_reversed() {
            stops.into_iter().rev().collect()
        } else {
            stops
        };
        let coords: Vec<Point> = ordered.iter().map(|s| s.location).collect();
        let path = build_path(&coords, line.mode, router).await?;
        let marks = mark_stops(&path, &ordered);
        let estimated_trip_minutes = tuning.estimated_trip_minutes(path.length_meters());
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Some(Self {
            line_id: line.id.clone(),
            line_number: line.number.clone(),
            mode: line.mode,
            direction,
            schedule: line.schedule,
            path,
            marks,
            estimated_trip_minutes,
            ledger: SpawnLedger::new(),
            vehicles: Vec::new(),
            rng,
            render_clock_ms: 0.0,
            spawn_counter: 0,
        })
    }

    /// One frame: retire, spawn, advance.
    ///
    /// `now_minute` is the virtual minute of day; `dt_seconds` the real
    /// frame duration. A vehicle that finished its trip last frame stays
    /// visible at the terminus through one publish and leaves here.
    pub fn tick(&mut self, now_minute: u32, dt_seconds: f64, tuning: &SimTuning) {
        self.render_clock_ms += dt_seconds * 1000.0;
        let now_ms = self.render_clock_ms;

        let before = self.vehicles.len();
        self.vehicles.retain(|v| !v.is_completed());
        if self.vehicles.len() < before {
            debug!(
                line = %self.line_id,
                direction = %self.direction,
                retired = before - self.vehicles.len(),
                "retired finished vehicles"
            );
        }

        for slot in due_slots(
            self.schedule.as_ref(),
            now_minute,
            self.estimated_trip_minutes,
            &mut self.ledger,
        ) {
            let speed = self
                .rng
                .random_range(tuning.min_speed_mps..=tuning.max_speed_mps);
            self.spawn_counter += 1;
            let id = VehicleIdentifier::new(format!(
                "{}-{}-{}-{}-{}",
                self.mode, self.line_id, self.direction, slot.index, self.spawn_counter
            ));
            debug!(
                vehicle = %id,
                departure_minute = slot.departure_minute,
                progress = slot.initial_progress,
                "spawned vehicle"
            );
            self.vehicles.push(VehicleMotion::spawn(
                id,
                self.direction,
                &self.path,
                &self.marks,
                slot.initial_progress,
                speed,
                now_ms,
            ));
        }

        let traffic = self.mode.uses_street_routing();
        for vehicle in &mut self.vehicles {
            vehicle.advance(
                &self.path,
                &self.marks,
                tuning,
                traffic,
                now_ms,
                dt_seconds,
                &mut self.rng,
            );
        }
    }

    pub fn line_id(&self) -> &LineIdentifier {
        &self.line_id
    }

    pub fn direction(&self) -> TravelDirection {
        self.direction
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    pub fn stops(&self) -> impl Iterator<Item = &Arc<Stop>> {
        self.marks.iter().map(|m| &m.stop)
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn active_vehicle_ids(&self) -> Vec<VehicleIdentifier> {
        self.vehicles.iter().map(|v| v.id().clone()).collect()
    }

    pub fn positions_into(&self, out: &mut HashMap<VehicleIdentifier, Point>) {
        for vehicle in &self.vehicles {
            out.insert(vehicle.id().clone(), vehicle.position());
        }
    }

    pub fn views_into(&self, out: &mut Vec<VehicleView>) {
        for vehicle in &self.vehicles {
            let position = vehicle.position();
            out.push(VehicleView {
                id: vehicle.id().clone(),
                line_id: self.line_id.clone(),
                line_number: self.line_number.clone(),
                direction: self.direction,
                latitude: position.y(),
                longitude: position.x(),
                progress: vehicle.progress(),
                speed_mps: vehicle.speed_mps(),
                paused: vehicle.is_paused(self.render_clock_ms),
            });
        }
    }
}
