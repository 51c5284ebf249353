//! Top-level simulation facade.
//!
//! `TransitSimulation` owns the virtual clock, the network snapshot and one
//! `LineSession` per observed line-direction. The host calls `observe` when a
//! line comes on screen, `release` when it leaves, and `tick` once per render
//! frame; everything else is queries over the last published frame.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use geo::Point;
use headway_transit::identifiers::{LineIdentifier, VehicleIdentifier};
use headway_transit::models::types::{Result, TransitError, TravelDirection};
use headway_transit::snapshot::NetworkSnapshot;
use tracing::{debug, info, warn};

use crate::clock::{VirtualClock, minutes_of_day};
use crate::config::SimTuning;
use crate::routing::RouteProvider;
use crate::session::{LineSession, VehicleView};

pub struct TransitSimulation {
    snapshot: Arc<NetworkSnapshot>,
    clock: VirtualClock,
    tuning: SimTuning,
    router: Arc<dyn RouteProvider>,
    sessions: HashMap<(LineIdentifier, TravelDirection), LineSession>,
    positions: HashMap<VehicleIdentifier, Point>,
    seed: Option<u64>,
    sessions_built: u64,
}

impl TransitSimulation {
    pub fn new(
        snapshot: Arc<NetworkSnapshot>,
        clock: VirtualClock,
        tuning: SimTuning,
        router: Arc<dyn RouteProvider>,
    ) -> Self {
        Self {
            snapshot,
            clock,
            tuning,
            router,
            sessions: HashMap::new(),
            positions: HashMap::new(),
            seed: None,
            sessions_built: 0,
        }
    }

    /// Like `new`, but every session draws from a seed derived from `seed`,
    /// making identically-driven runs reproducible.
    pub fn with_seed(
        snapshot: Arc<NetworkSnapshot>,
        clock: VirtualClock,
        tuning: SimTuning,
        router: Arc<dyn RouteProvider>,
        seed: u64,
    ) -> Self {
        let mut sim = Self::new(snapshot, clock, tuning, router);
        sim.seed = Some(seed);
        sim
    }

    /// Start simulating a line. One session per travel direction; directions
    /// already observed are left as they are.
    ///
    /// Returns how many sessions this call created. A line whose stop ids
    /// resolve to fewer than two stops is skipped with a warning, since
    /// there is no path to drive.
    pub async fn observe(&mut self, line_id: &LineIdentifier) -> Result<usize> {
        let line = self
            .snapshot
            .line(line_id)
            .ok_or_else(|| TransitError::LineNotFound(line_id.clone()))?;

        let stops = self.snapshot.ordered_stops(&line);
        if stops.len() < 2 {
            warn!(line = %line.id, resolved = stops.len(), "not enough stops to simulate line");
            return Ok(0);
        }

        let mut created = 0;
        for &direction in line.direction.travel_directions() {
            let key = (line.id.clone(), direction);
            if self.sessions.contains_key(&key) {
                continue;
            }
            let seed = self.seed.map(|base| base.wrapping_add(self.sessions_built));
            let session = LineSession::build(
                &line,
                direction,
                stops.clone(),
                self.router.as_ref(),
                &self.tuning,
                seed,
            )
            .await;
            if let Some(session) = session {
                self.sessions.insert(key, session);
                self.sessions_built += 1;
                created += 1;
            }
        }

        if created > 0 {
            info!(line = %line.id, sessions = created, "line under observation");
        }
        Ok(created)
    }

    /// Stop simulating a line. Drops its sessions and their vehicles.
    pub fn release(&mut self, line_id: &LineIdentifier) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|(id, _), _| id != line_id);
        let removed = before - self.sessions.len();
        if removed > 0 {
            debug!(line = %line_id, sessions = removed, "line released");
            self.rebuild_positions();
        }
        removed
    }

    /// Swap in fresh network data.
    ///
    /// Sessions whose line no longer exists are dropped; surviving sessions
    /// keep their paths and vehicles, since a data refresh should not reset
    /// trips already underway.
    pub fn refresh_snapshot(&mut self, snapshot: Arc<NetworkSnapshot>) {
        self.sessions.retain(|(line_id, direction), _| {
            let keep = snapshot.line(line_id).is_some();
            if !keep {
                debug!(line = %line_id, direction = %direction, "line gone after refresh, dropping session");
            }
            keep
        });
        self.snapshot = snapshot;
        self.rebuild_positions();
    }

    /// Advance one frame of `dt_seconds` real render time at the wall clock.
    pub fn tick(&mut self, dt_seconds: f64) -> NaiveDateTime {
        self.tick_at(Utc::now().timestamp_millis(), dt_seconds)
    }

    /// Advance one frame at an explicit real timestamp.
    ///
    /// Together with `with_seed` and an anchored clock this makes whole runs
    /// reproducible: the same timestamps in produce the same positions out.
    /// Returns the virtual time of the frame.
    pub fn tick_at(&mut self, real_epoch_ms: i64, dt_seconds: f64) -> NaiveDateTime {
        let sim_now = self.clock.now_at(real_epoch_ms);
        let now_minute = minutes_of_day(sim_now);
        for session in self.sessions.values_mut() {
            session.tick(now_minute, dt_seconds, &self.tuning);
        }
        self.rebuild_positions();
        sim_now
    }

    fn rebuild_positions(&mut self) {
        self.positions.clear();
        for session in self.sessions.values() {
            session.positions_into(&mut self.positions);
        }
    }

    /// Current virtual time.
    pub fn now(&mut self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Current virtual time as "HH:MM:SS".
    pub fn formatted_time(&mut self) -> String {
        self.clock.formatted()
    }

    /// Last published position of a vehicle, if it is still active.
    pub fn position_of(&self, id: &VehicleIdentifier) -> Option<Point> {
        self.positions.get(id).copied()
    }

    /// Ids of the vehicles currently running one direction of a line.
    pub fn active_vehicles_for(
        &self,
        line_id: &LineIdentifier,
        direction: TravelDirection,
    ) -> Vec<VehicleIdentifier> {
        self.sessions
            .get(&(line_id.clone(), direction))
            .map(|s| s.active_vehicle_ids())
            .unwrap_or_default()
    }

    /// All active vehicles across observed lines, sorted by id.
    pub fn vehicle_views(&self) -> Vec<VehicleView> {
        let mut views = Vec::new();
        for session in self.sessions.values() {
            session.views_into(&mut views);
        }
        views.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        views
    }

    pub fn vehicle_count(&self) -> usize {
        self.sessions.values().map(|s| s.vehicle_count()).sum()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_observing(&self, line_id: &LineIdentifier) -> bool {
        self.sessions.keys().any(|(id, _)| id == line_id)
    }

    pub fn session(
        &self,
        line_id: &LineIdentifier,
        direction: TravelDirection,
    ) -> Option<&LineSession> {
        self.sessions.get(&(line_id.clone(), direction))
    }

    pub fn snapshot(&self) -> &Arc<NetworkSnapshot> {
        &self.snapshot
    }

    pub fn tuning(&self) -> &SimTuning {
        &self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockAnchors;
    use crate::routing::{RoutingError, RoutingResult, StraightLineRouter};
    use chrono::NaiveDate;
    use headway_transit::identifiers::StopIdentifier;
    use headway_transit::models::types::{Schedule, ServiceDirection, TransitMode};
    use headway_transit::snapshot::{Line, Stop};
    use std::future::Future;
    use std::pin::Pin;

    /// Router double that always errors, forcing the straight-line fallback.
    struct UnreachableRouter;

    impl RouteProvider for UnreachableRouter {
        fn street_path<'a>(
            &'a self,
            _waypoints: &'a [Point],
        ) -> Pin<Box<dyn Future<Output = RoutingResult<Vec<Point>>> + Send + 'a>> {
            Box::pin(async { Err(RoutingError::Rejected("NoRoute".to_string())) })
        }
    }

    fn make_stop(id: &str, lon: f64, lat: f64) -> Stop {
        Stop {
            id: StopIdentifier::new(id),
            name: id.into(),
            location: Point::new(lon, lat),
        }
    }

    fn make_line(
        id: &str,
        mode: TransitMode,
        direction: ServiceDirection,
        stop_ids: &[&str],
        schedule: Option<Schedule>,
    ) -> Line {
        Line {
            id: LineIdentifier::new(id),
            number: "4".into(),
            long_name: "Test Line".into(),
            mode,
            direction,
            stop_ids: stop_ids.iter().map(StopIdentifier::new).collect(),
            schedule,
        }
    }

    /// Three stops roughly 1.1 km apart along a meridian.
    fn make_snapshot() -> Arc<NetworkSnapshot> {
        Arc::new(NetworkSnapshot::from_data(
            vec![
                make_stop("a", 0.0, 0.0),
                make_stop("b", 0.0, 0.01),
                make_stop("c", 0.0, 0.02),
            ],
            vec![
                make_line(
                    "l1",
                    TransitMode::Bus,
                    ServiceDirection::Outbound,
                    &["a", "b", "c"],
                    Schedule::parse("06:00", "07:00", 20).ok(),
                ),
                make_line(
                    "m1",
                    TransitMode::Metro,
                    ServiceDirection::Both,
                    &["a", "c"],
                    Schedule::parse("06:00", "22:00", 10).ok(),
                ),
                make_line(
                    "thin",
                    TransitMode::Bus,
                    ServiceDirection::Outbound,
                    &["a"],
                    Schedule::parse("06:00", "22:00", 10).ok(),
                ),
            ],
            vec![],
        ))
    }

    fn six_am_clock() -> VirtualClock {
        let sim = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        VirtualClock::anchored(ClockAnchors::at(0, sim), 60.0)
    }

    fn make_sim() -> TransitSimulation {
        TransitSimulation::with_seed(
            make_snapshot(),
            six_am_clock(),
            SimTuning::default(),
            Arc::new(StraightLineRouter),
            7,
        )
    }

    #[test]
    fn test_observe_unknown_line_fails() {
        let mut sim = make_sim();
        let err = pollster::block_on(sim.observe(&LineIdentifier::new("nope"))).unwrap_err();
        assert!(matches!(err, TransitError::LineNotFound(_)));
    }

    #[test]
    fn test_observe_line_with_one_stop_is_skipped() {
        let mut sim = make_sim();
        let created = pollster::block_on(sim.observe(&LineIdentifier::new("thin"))).unwrap();
        assert_eq!(created, 0);
        assert!(!sim.is_observing(&LineIdentifier::new("thin")));
    }

    #[test]
    fn test_observe_both_directions() {
        let mut sim = make_sim();
        let created = pollster::block_on(sim.observe(&LineIdentifier::new("m1"))).unwrap();
        assert_eq!(created, 2);
        assert_eq!(sim.session_count(), 2);

        // Observing again builds nothing new
        let created = pollster::block_on(sim.observe(&LineIdentifier::new("m1"))).unwrap();
        assert_eq!(created, 0);
        assert_eq!(sim.session_count(), 2);
    }

    /// Uniform speed and no holds keep frame-by-frame positions exact.
    fn uniform_tuning() -> SimTuning {
        SimTuning {
            min_speed_mps: 700.0,
            max_speed_mps: 700.0,
            average_speed_mps: 700.0,
            dwell_ms: 0,
            traffic_pause_probability: 0.0,
            ..SimTuning::default()
        }
    }

    // Road-mode line, routing service down: paths fall back to straight
    // segments and the day still runs.
    #[test]
    fn test_tick_spawns_through_the_service_window() {
        let mut sim = TransitSimulation::with_seed(
            make_snapshot(),
            six_am_clock(),
            uniform_tuning(),
            Arc::new(UnreachableRouter),
            7,
        );
        let line = LineIdentifier::new("l1");
        pollster::block_on(sim.observe(&line)).unwrap();

        // 06:00: first departure
        let now = sim.tick_at(0, 1.0 / 60.0);
        assert_eq!(minutes_of_day(now), 360);
        let active = sim.active_vehicles_for(&line, TravelDirection::Outbound);
        assert_eq!(active.len(), 1);
        let first = active[0].clone();
        assert!(sim.position_of(&first).is_some());

        // 06:20: second departure joins, first still en route
        sim.tick_at(20_000, 1.0);
        assert_eq!(
            sim.active_vehicles_for(&line, TravelDirection::Outbound).len(),
            2
        );

        // 07:01: window closed, nothing new spawns
        let now = sim.tick_at(61_000, 1.0);
        assert_eq!(minutes_of_day(now), 421);
        assert_eq!(
            sim.active_vehicles_for(&line, TravelDirection::Outbound).len(),
            2
        );

        // Earlier departure is further along
        let views = sim.vehicle_views();
        let first_view = views.iter().find(|v| v.id == first).unwrap();
        let other_view = views.iter().find(|v| v.id != first).unwrap();
        assert!(first_view.progress > other_view.progress);
        assert!(other_view.progress > 0.0);

        // A long frame finishes both trips; the frame after sweeps them out
        sim.tick_at(62_000, 30.0);
        assert_eq!(sim.vehicle_count(), 2);
        for view in sim.vehicle_views() {
            assert!((view.progress - 1.0).abs() < 1e-12);
        }
        sim.tick_at(63_000, 1.0 / 60.0);
        assert_eq!(sim.vehicle_count(), 0);
        assert!(sim.position_of(&first).is_none());
    }

    #[test]
    fn test_release_drops_sessions_and_positions() {
        let mut sim = make_sim();
        let line = LineIdentifier::new("l1");
        pollster::block_on(sim.observe(&line)).unwrap();
        sim.tick_at(0, 1.0 / 60.0);
        assert_eq!(sim.vehicle_count(), 1);
        let id = sim.active_vehicles_for(&line, TravelDirection::Outbound)[0].clone();

        assert_eq!(sim.release(&line), 1);
        assert_eq!(sim.session_count(), 0);
        assert!(sim.position_of(&id).is_none());
        // Releasing again is a no-op
        assert_eq!(sim.release(&line), 0);
    }

    #[test]
    fn test_refresh_drops_vanished_lines_only() {
        let mut sim = make_sim();
        pollster::block_on(sim.observe(&LineIdentifier::new("l1"))).unwrap();
        pollster::block_on(sim.observe(&LineIdentifier::new("m1"))).unwrap();
        sim.tick_at(0, 1.0 / 60.0);
        assert_eq!(sim.session_count(), 3);

        // New snapshot without m1
        let smaller = Arc::new(NetworkSnapshot::from_data(
            vec![
                make_stop("a", 0.0, 0.0),
                make_stop("b", 0.0, 0.01),
                make_stop("c", 0.0, 0.02),
            ],
            vec![make_line(
                "l1",
                TransitMode::Bus,
                ServiceDirection::Outbound,
                &["a", "b", "c"],
                Schedule::parse("06:00", "07:00", 20).ok(),
            )],
            vec![],
        ));
        sim.refresh_snapshot(smaller);

        assert_eq!(sim.session_count(), 1);
        assert!(sim.is_observing(&LineIdentifier::new("l1")));
        assert!(!sim.is_observing(&LineIdentifier::new("m1")));
        // The surviving session kept its vehicle
        assert_eq!(sim.vehicle_count(), 1);
    }

    #[test]
    fn test_seeded_runs_reproduce() {
        // Full per-frame trajectory of every vehicle, random speed draws left on
        let drive = || {
            let mut sim = make_sim();
            pollster::block_on(sim.observe(&LineIdentifier::new("m1"))).unwrap();
            let mut history: Vec<(String, f64, f64)> = Vec::new();
            for frame in 0..180 {
                sim.tick_at(frame * 250, 0.25);
                for view in sim.vehicle_views() {
                    history.push((view.id.as_str().to_string(), view.progress, view.latitude));
                }
            }
            history
        };

        let a = drive();
        let b = drive();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }
}
