//! Departure boards and per-stop arrival estimates.
//!
//! Pure schedule arithmetic for list views: which departures are still
//! ahead, and when each trip should reach a given stop. Estimates use the
//! same trip-duration model the scheduler uses for catch-up spawns, so a
//! board and the moving markers agree with each other.

use chrono::NaiveTime;
use geo::Point;
use headway_transit::models::types::Schedule;
use tracing::warn;

use crate::config::SimTuning;
use crate::geometry::RoutePath;

const MINUTES_PER_DAY: u32 = 24 * 60;

fn minute_to_time(minute: u32) -> NaiveTime {
    let minute = minute % MINUTES_PER_DAY;
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// One slot of a line's departure board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpcomingDeparture {
    pub slot_index: u32,
    pub minute_of_day: u32,
    pub time: NaiveTime,
}

/// Departures at or after `now_minute`, at most `limit` of them.
///
/// Before the window opens this is the head of the day's board; after the
/// last departure it is empty.
pub fn upcoming_departures(
    schedule: &Schedule,
    now_minute: u32,
    limit: usize,
) -> Vec<UpcomingDeparture> {
    let first = schedule.first_minute();
    let last = schedule.last_minute();
    let headway = schedule.headway_minutes;
    if headway == 0 {
        warn!("schedule with zero headway, no departures");
        return Vec::new();
    }

    let start_index = if now_minute <= first {
        0
    } else {
        (now_minute - first).div_ceil(headway)
    };

    let mut out = Vec::new();
    let mut index = start_index;
    while out.len() < limit {
        let minute = first + index * headway;
        if minute > last {
            break;
        }
        out.push(UpcomingDeparture {
            slot_index: index,
            minute_of_day: minute,
            time: minute_to_time(minute),
        });
        index += 1;
    }
    out
}

/// One trip's estimated arrival at a stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopArrival {
    pub slot_index: u32,
    pub departure: NaiveTime,
    pub eta: NaiveTime,
    pub eta_minute: u32,
    /// The trip has already left the terminus and is en route.
    pub departed: bool,
}

/// Trips still due to reach the stop nearest `stop_location`, soonest first.
///
/// The arrival offset is the trip's estimated duration scaled by how far
/// along the path the stop sits. Trips whose estimated arrival is already
/// behind `now_minute` are dropped, including ones that never spawned.
pub fn arrivals_at_stop(
    schedule: &Schedule,
    path: &RoutePath,
    stop_location: Point,
    now_minute: u32,
    tuning: &SimTuning,
    limit: usize,
) -> Vec<StopArrival> {
    let first = schedule.first_minute();
    let last = schedule.last_minute();
    let headway = schedule.headway_minutes;
    if headway == 0 {
        warn!("schedule with zero headway, no arrivals");
        return Vec::new();
    }

    let est_total = tuning.estimated_trip_minutes(path.length_meters());
    let offset = (est_total * path.progress_near(stop_location)).round() as u32;

    let mut out = Vec::new();
    let mut index = 0u32;
    while out.len() < limit {
        let departure_minute = first + index * headway;
        if departure_minute > last {
            break;
        }
        let eta_minute = departure_minute + offset;
        if eta_minute >= now_minute {
            out.push(StopArrival {
                slot_index: index,
                departure: minute_to_time(departure_minute),
                eta: minute_to_time(eta_minute),
                eta_minute,
                departed: departure_minute < now_minute,
            });
        }
        index += 1;
    }
    out
}
