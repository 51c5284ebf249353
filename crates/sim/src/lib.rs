//! # headway-sim
//!
//! Schedule-driven vehicle simulation over a static transit network.
//!
//! No live vehicle feed exists for the network, so this crate fabricates
//! one: a virtual clock runs the day at 60x, departures spawn from each
//! line's headway table, and every active vehicle is moved along its route
//! geometry frame by frame. The host renders the result as if it were a
//! realtime feed.
//!
//! ## Features
//!
//! - **Virtual clock**: Anchored, persistable, resets over the dead window
//! - **Headway scheduler**: Idempotent spawning with mid-trip catch-up
//! - **Route geometry**: Street routing for buses, straight legs for rail
//! - **Per-frame motion**: Stop dwell, traffic holds, snap-to-stop arrivals
//!
//! ## Example
//!
//! ```
//! use headway_sim::prelude::*;
//! use headway_transit::prelude::*;
//! use chrono::NaiveDate;
//! use geo::Point;
//! use std::sync::Arc;
//!
//! let stops = vec![
//!     Stop { id: StopIdentifier::new("a"), name: "A".into(), location: Point::new(0.0, 0.0) },
//!     Stop { id: StopIdentifier::new("b"), name: "B".into(), location: Point::new(0.0, 0.01) },
//! ];
//! let line = Line {
//!     id: LineIdentifier::new("t1"),
//!     number: "1".into(),
//!     long_name: "A to B".into(),
//!     mode: TransitMode::Tram,
//!     direction: ServiceDirection::Outbound,
//!     stop_ids: vec![StopIdentifier::new("a"), StopIdentifier::new("b")],
//!     schedule: Schedule::parse("06:00", "22:00", 15).ok(),
//! };
//! let snapshot = Arc::new(NetworkSnapshot::from_data(stops, vec![line], vec![]));
//!
//! // Anchor the clock at 06:00 and drive one frame
//! let opening = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(6, 0, 0).unwrap();
//! let clock = VirtualClock::anchored(ClockAnchors::at(0, opening), 60.0);
//! let mut sim = TransitSimulation::new(
//!     snapshot,
//!     clock,
//!     SimTuning::default(),
//!     Arc::new(StraightLineRouter),
//! );
//!
//! pollster::block_on(sim.observe(&LineIdentifier::new("t1"))).unwrap();
//! sim.tick_at(0, 1.0 / 60.0);
//! assert_eq!(sim.vehicle_count(), 1);
//! ```

pub mod clock;
pub mod config;
pub mod departures;
pub mod engine;
pub mod geometry;
pub mod routing;
pub mod scheduler;
pub mod session;
pub mod vehicle;

// Re-exports for convenience
pub mod prelude {
    pub use crate::clock::{AnchorStore, ClockAnchors, MemoryAnchorStore, VirtualClock};
    pub use crate::config::SimTuning;
    pub use crate::departures::{
        StopArrival, UpcomingDeparture, arrivals_at_stop, upcoming_departures,
    };
    pub use crate::engine::TransitSimulation;
    pub use crate::geometry::RoutePath;
    pub use crate::routing::{OsrmRouter, RouteProvider, RoutingError, StraightLineRouter};
    pub use crate::session::{LineSession, VehicleView};
    pub use crate::vehicle::MotionPhase;
}

// Module declarations
pub use prelude::*;
