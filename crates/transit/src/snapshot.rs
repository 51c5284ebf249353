//! In-memory snapshot of the transit network.
//!
//! Holds the stops, lines and fleet metadata fetched from the backend,
//! with lookup maps and a spatial index for fast queries. A snapshot is
//! immutable once built; the app swaps in a whole new one on refresh.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Point;
use rstar::RTree;
use tracing::debug;

use crate::identifiers::*;
use crate::models::types::*;
use crate::records::{LineRecord, StopRecord, VehicleRecord};
use crate::spatial::index::StopNode;
use crate::spatial::queries::haversine_distance;

// ============================================================================
// Network Entities
// ============================================================================

#[derive(Clone, Debug)]
pub struct Stop {
    pub id: StopIdentifier,
    pub name: Arc<str>,
    pub location: Point,
}

#[derive(Clone, Debug)]
pub struct Line {
    pub id: LineIdentifier,
    pub number: Arc<str>,
    pub long_name: Arc<str>,
    pub mode: TransitMode,
    pub direction: ServiceDirection,
    /// Outbound stop order. Inbound service walks this back to front.
    pub stop_ids: Vec<StopIdentifier>,
    /// `None` means the line exists but runs no service.
    pub schedule: Option<Schedule>,
}

/// Fleet metadata attached to a line, for display only.
#[derive(Clone, Debug)]
pub struct VehicleInfo {
    pub id: VehicleIdentifier,
    pub line_id: LineIdentifier,
    pub number: Arc<str>,
    pub status: Arc<str>,
    pub occupancy: Option<Arc<str>>,
}

// ============================================================================
// Network Snapshot
// ============================================================================

/// Immutable network snapshot with spatial indexing
///
/// This type is cheap to clone since all data is stored in `Arc`s.
#[derive(Clone)]
pub struct NetworkSnapshot {
    // Core data
    stops: Vec<Arc<Stop>>,
    lines: Vec<Arc<Line>>,
    vehicles: Vec<Arc<VehicleInfo>>,

    // Lookup maps
    stop_map: HashMap<StopIdentifier, Arc<Stop>>,
    line_map: HashMap<LineIdentifier, Arc<Line>>,
    line_vehicles: HashMap<LineIdentifier, Vec<Arc<VehicleInfo>>>,

    // Spatial index
    stop_tree: RTree<StopNode>,
}

impl NetworkSnapshot {
    /// Create a new empty snapshot
    pub fn new() -> Self {
        Self {
            stops: Vec::new(),
            lines: Vec::new(),
            vehicles: Vec::new(),
            stop_map: HashMap::new(),
            line_map: HashMap::new(),
            line_vehicles: HashMap::new(),
            stop_tree: RTree::new(),
        }
    }

    /// Build a snapshot from model data
    pub fn from_data(stops: Vec<Stop>, lines: Vec<Line>, vehicles: Vec<VehicleInfo>) -> Self {
        let stops: Vec<Arc<Stop>> = stops.into_iter().map(Arc::new).collect();
        let lines: Vec<Arc<Line>> = lines.into_iter().map(Arc::new).collect();
        let vehicles: Vec<Arc<VehicleInfo>> = vehicles.into_iter().map(Arc::new).collect();

        // Build lookup maps
        let stop_map: HashMap<_, _> = stops
            .iter()
            .map(|s| (s.id.clone(), s.clone()))
            .collect();

        let line_map: HashMap<_, _> = lines
            .iter()
            .map(|l| (l.id.clone(), l.clone()))
            .collect();

        let mut line_vehicles: HashMap<LineIdentifier, Vec<Arc<VehicleInfo>>> = HashMap::new();
        for vehicle in &vehicles {
            line_vehicles
                .entry(vehicle.line_id.clone())
                .or_default()
                .push(vehicle.clone());
        }

        // Build spatial index
        let stop_tree = RTree::bulk_load(
            stops
                .iter()
                .map(|s| StopNode::new(s.location, s.clone()))
                .collect(),
        );

        Self {
            stops,
            lines,
            vehicles,
            stop_map,
            line_map,
            line_vehicles,
            stop_tree,
        }
    }

    /// Build a snapshot from backend wire records, skipping invalid ones
    pub fn from_records(
        stops: Vec<StopRecord>,
        lines: Vec<LineRecord>,
        vehicles: Vec<VehicleRecord>,
    ) -> Self {
        Self::from_data(
            stops.into_iter().filter_map(StopRecord::into_stop).collect(),
            lines.into_iter().filter_map(LineRecord::into_line).collect(),
            vehicles.into_iter().filter_map(VehicleRecord::into_info).collect(),
        )
    }

    pub fn stop(&self, id: &StopIdentifier) -> Option<Arc<Stop>> {
        self.stop_map.get(id).cloned()
    }

    pub fn line(&self, id: &LineIdentifier) -> Option<Arc<Line>> {
        self.line_map.get(id).cloned()
    }

    pub fn all_stops(&self) -> &[Arc<Stop>] {
        &self.stops
    }

    pub fn all_lines(&self) -> &[Arc<Line>] {
        &self.lines
    }

    pub fn all_vehicles(&self) -> &[Arc<VehicleInfo>] {
        &self.vehicles
    }

    /// Resolve a line's stop sequence, dropping ids that point nowhere.
    pub fn ordered_stops(&self, line: &Line) -> Vec<Arc<Stop>> {
        line.stop_ids
            .iter()
            .filter_map(|id| {
                let stop = self.stop_map.get(id).cloned();
                if stop.is_none() {
                    debug!(line = %line.id, stop = %id, "dangling stop id in line, dropping");
                }
                stop
            })
            .collect()
    }

    pub fn vehicles_for_line(&self, id: &LineIdentifier) -> Vec<Arc<VehicleInfo>> {
        self.line_vehicles.get(id).cloned().unwrap_or_default()
    }

    /// All stops within `radius_m` meters of a point.
    pub fn stops_near(&self, point: Point, radius_m: f64) -> Vec<Arc<Stop>> {
        // Validate radius is positive
        if radius_m <= 0.0 || !radius_m.is_finite() {
            return Vec::new();
        }

        self.stop_tree
            .locate_within_distance([point.x(), point.y()], radius_m)
            .filter(|node| haversine_distance(point, node.stop.location) <= radius_m)
            .map(|node| node.stop.clone())
            .collect()
    }

    /// The `n` stops closest to a point, nearest first.
    pub fn nearest_stops(&self, point: Point, n: usize) -> Vec<Arc<Stop>> {
        self.stop_tree
            .nearest_neighbor_iter(&[point.x(), point.y()])
            .take(n)
            .map(|node| node.stop.clone())
            .collect()
    }
}

impl Default for NetworkSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
