//! Wire records as served by the network backend.
//!
//! These mirror the backend JSON documents field for field. Conversion into
//! the model types is tolerant: a record that cannot be made sense of is
//! skipped with a warning rather than failing the whole payload, and a line
//! whose schedule is malformed converts with `schedule: None` so the line
//! still exists but runs no service.

use std::str::FromStr;

use geo::Point;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::identifiers::{LineIdentifier, StopIdentifier, VehicleIdentifier};
use crate::models::types::{Schedule, ServiceDirection, TransitMode};
use crate::snapshot::{Line, Stop, VehicleInfo};

// ============================================================================
// Record Types
// ============================================================================

/// A stop document: `{"id": "...", "name": "...", "coordinate": [lon, lat]}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub id: String,
    pub name: String,
    /// Longitude first, GeoJSON order.
    pub coordinate: [f64; 2],
}

/// A line document with its stop sequence and daily schedule.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRecord {
    pub id: String,
    pub number: String,
    #[serde(default)]
    pub long_name: String,
    /// "Bus", "Tram" or "Metro".
    pub mode: String,
    /// "Outbound", "Inbound" or "Both". Absent means the mode's default.
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub ordered_stop_ids: Vec<String>,
    #[serde(default)]
    pub schedule: Option<ScheduleRecord>,
}

/// Schedule block embedded in a line document.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRecord {
    /// "HH:MM", 24-hour.
    pub first_departure: String,
    pub last_departure: String,
    pub headway_minutes: u32,
}

/// A fleet vehicle document (display metadata, not simulated state).
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    pub id: String,
    pub line_id: String,
    pub number: String,
    /// "On Time", "Delayed" or "Out of Service". Absent means on time.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub occupancy: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

impl StopRecord {
    pub fn into_stop(self) -> Option<Stop> {
        if self.id.is_empty() {
            warn!(name = %self.name, "stop record without id, skipping");
            return None;
        }
        let [lon, lat] = self.coordinate;
        if !lon.is_finite() || !lat.is_finite() || lon.abs() > 180.0 || lat.abs() > 90.0 {
            warn!(stop = %self.id, lon, lat, "stop record with bad coordinate, skipping");
            return None;
        }
        Some(Stop {
            id: StopIdentifier::new(self.id),
            name: self.name.into(),
            location: Point::new(lon, lat),
        })
    }
}

impl ScheduleRecord {
    pub fn into_schedule(self) -> Option<Schedule> {
        match Schedule::parse(&self.first_departure, &self.last_departure, self.headway_minutes) {
            Ok(schedule) => Some(schedule),
            Err(e) => {
                warn!(error = %e, "malformed schedule, line will run no service");
                None
            }
        }
    }
}

impl LineRecord {
    pub fn into_line(self) -> Option<Line> {
        if self.id.is_empty() {
            warn!(number = %self.number, "line record without id, skipping");
            return None;
        }
        let mode = match TransitMode::from_str(&self.mode) {
            Ok(mode) => mode,
            Err(_) => {
                warn!(line = %self.id, mode = %self.mode, "unknown transit mode, skipping line");
                return None;
            }
        };
        let direction = match self.direction.as_deref() {
            None | Some("") => ServiceDirection::default_for(mode),
            Some(raw) => ServiceDirection::from_str(raw).unwrap_or_else(|_| {
                warn!(line = %self.id, direction = raw, "unknown direction, using mode default");
                ServiceDirection::default_for(mode)
            }),
        };
        let schedule = match self.schedule {
            Some(record) => record.into_schedule(),
            None => {
                debug!(line = %self.id, "line record without schedule, no service");
                None
            }
        };
        Some(Line {
            id: LineIdentifier::new(self.id),
            number: self.number.into(),
            long_name: self.long_name.into(),
            mode,
            direction,
            stop_ids: self
                .ordered_stop_ids
                .into_iter()
                .map(StopIdentifier::new)
                .collect(),
            schedule,
        })
    }
}

impl VehicleRecord {
    pub fn into_info(self) -> Option<VehicleInfo> {
        if self.id.is_empty() || self.line_id.is_empty() {
            warn!(number = %self.number, "vehicle record missing id or line, skipping");
            return None;
        }
        Some(VehicleInfo {
            id: VehicleIdentifier::new(self.id),
            line_id: LineIdentifier::new(self.line_id),
            number: self.number.into(),
            status: self.status.unwrap_or_else(|| "On Time".to_string()).into(),
            occupancy: self.occupancy.map(Into::into),
        })
    }
}
