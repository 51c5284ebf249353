//! # headway-transit
//!
//! Static transit network model: stops, lines, daily schedules and fleet
//! metadata, with spatial queries over the stop set.
//!
//! ## Features
//!
//! - **Wire records**: Tolerant parsing of the backend JSON documents
//! - **Spatial queries**: Fast R-tree based lookup of nearby stops
//! - **Immutable snapshots**: Cheap to clone, swapped wholesale on refresh
//!
//! ## Example
//!
//! ```
//! use headway_transit::prelude::*;
//! use geo::Point;
//!
//! // Create a snapshot with test data
//! let stop = Stop {
//!     id: StopIdentifier::new("merkez"),
//!     name: "Merkez".into(),
//!     location: Point::new(39.2225, 38.6748),
//! };
//!
//! let snapshot = NetworkSnapshot::from_data(vec![stop], vec![], vec![]);
//!
//! // Query stops
//! let here = Point::new(39.2230, 38.6750); // city center
//! let nearby = snapshot.stops_near(here, 500.0); // 500m radius
//! assert_eq!(nearby.len(), 1);
//! ```

pub mod identifiers;
pub mod models;
pub mod records;
pub mod snapshot;
pub mod spatial;

// Re-exports for convenience
pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::models::types::*;
    pub use crate::records::{LineRecord, ScheduleRecord, StopRecord, VehicleRecord};
    pub use crate::snapshot::{Line, NetworkSnapshot, Stop, VehicleInfo};
    pub use crate::spatial::queries::haversine_distance;
}

// Module declarations
pub use prelude::*;
