//! Tuning knobs for the simulation.

use serde::{Deserialize, Serialize};

/// All tunable constants in one place.
///
/// The defaults reproduce the production feel: a 60x virtual clock over
/// real-time rendering, which is why the vehicle speeds look absurd when
/// read as street speeds. A vehicle covering its route in five render
/// minutes has covered it in five schedule hours.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimTuning {
    /// Virtual seconds per real second.
    pub clock_speed: f64,
    /// A vehicle within this many meters of its next stop has arrived.
    pub stop_radius_m: f64,
    /// Render-clock milliseconds spent dwelling at a stop.
    pub dwell_ms: u64,
    /// Lower bound of the per-vehicle speed draw, meters per render second.
    pub min_speed_mps: f64,
    /// Upper bound of the per-vehicle speed draw, meters per render second.
    pub max_speed_mps: f64,
    /// Fleet-average speed used for trip duration estimates.
    pub average_speed_mps: f64,
    /// How often a road vehicle rolls for a traffic event, render ms.
    pub traffic_check_interval_ms: u64,
    /// Chance per roll that a road vehicle hits traffic.
    pub traffic_pause_probability: f64,
    /// Shortest traffic hold, render ms.
    pub traffic_pause_min_ms: u64,
    /// Longest traffic hold, render ms.
    pub traffic_pause_max_ms: u64,
}

impl Default for SimTuning {
    fn default() -> Self {
        Self {
            clock_speed: 60.0,
            stop_radius_m: 50.0,
            dwell_ms: 500,
            min_speed_mps: 555.0,
            max_speed_mps: 833.0,
            average_speed_mps: 694.0,
            traffic_check_interval_ms: 2000,
            traffic_pause_probability: 0.10,
            traffic_pause_min_ms: 500,
            traffic_pause_max_ms: 1500,
        }
    }
}

impl SimTuning {
    /// Virtual minutes a trip of `length_m` meters is expected to take.
    ///
    /// Motion runs on render seconds while schedules run on virtual minutes;
    /// the clock speed converts between the two timelines.
    pub fn estimated_trip_minutes(&self, length_m: f64) -> f64 {
        if self.average_speed_mps <= 0.0 || length_m <= 0.0 {
            return 0.0;
        }
        let render_seconds = length_m / self.average_speed_mps;
        render_seconds * self.clock_speed / 60.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_consistent() {
        let tuning = SimTuning::default();
        assert!(tuning.min_speed_mps <= tuning.average_speed_mps);
        assert!(tuning.average_speed_mps <= tuning.max_speed_mps);
        assert!(tuning.traffic_pause_min_ms <= tuning.traffic_pause_max_ms);
        assert!(tuning.traffic_pause_probability >= 0.0);
        assert!(tuning.traffic_pause_probability <= 1.0);
    }

    #[test]
    fn test_estimated_trip_minutes() {
        let tuning = SimTuning {
            clock_speed: 60.0,
            average_speed_mps: 100.0,
            ..SimTuning::default()
        };
        // 6 km at 100 m/s is 60 render seconds, so 60 virtual minutes
        assert_relative_eq!(tuning.estimated_trip_minutes(6_000.0), 60.0);
        // Degenerate inputs estimate to zero
        assert_eq!(tuning.estimated_trip_minutes(0.0), 0.0);
        assert_eq!(tuning.estimated_trip_minutes(-10.0), 0.0);
    }

    #[test]
    fn test_partial_overrides_deserialize() {
        let tuning: SimTuning = serde_json::from_str(r#"{"stopRadiusM": 25.0}"#).unwrap();
        assert_eq!(tuning.stop_radius_m, 25.0);
        assert_eq!(tuning.dwell_ms, 500);
    }
}
