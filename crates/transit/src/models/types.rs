//! Core data types and enums for transit data.

use chrono::{NaiveTime, Timelike};
use strum::{Display, EnumString};

use crate::identifiers::*;

// ============================================================================
// Enums
// ============================================================================

/// Kind of vehicle serving a line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TransitMode {
    Bus,
    Tram,
    Metro,
}

impl TransitMode {
    /// Rail modes follow their stop sequence directly; no street routing.
    pub fn is_fixed_guideway(&self) -> bool {
        matches!(self, Self::Tram | Self::Metro)
    }

    /// Road modes get their geometry from a street router when one is available.
    pub fn uses_street_routing(&self) -> bool {
        matches!(self, Self::Bus)
    }
}

/// Which directions a line runs service in.
///
/// `Both` means one schedule record drives two independent traversals of the
/// same stop sequence, one per direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum ServiceDirection {
    Outbound,
    Inbound,
    Both,
}

impl ServiceDirection {
    /// Fixed-guideway lines run both ways unless the record says otherwise.
    pub fn default_for(mode: TransitMode) -> Self {
        if mode.is_fixed_guideway() {
            Self::Both
        } else {
            Self::Outbound
        }
    }

    /// The concrete travel directions this service spans.
    pub fn travel_directions(&self) -> &'static [TravelDirection] {
        match self {
            Self::Outbound => &[TravelDirection::Outbound],
            Self::Inbound => &[TravelDirection::Inbound],
            Self::Both => &[TravelDirection::Outbound, TravelDirection::Inbound],
        }
    }
}

/// One concrete traversal direction of a line's stop sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TravelDirection {
    Outbound,
    Inbound,
}

impl TravelDirection {
    /// Inbound trips walk the stop sequence back to front.
    pub fn is_reversed(&self) -> bool {
        matches!(self, Self::Inbound)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Daily service window and headway for a line.
///
/// Departures happen at `first_departure + k * headway_minutes` for
/// k = 0, 1, 2, ... while the departure time is within the window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    pub first_departure: NaiveTime,
    pub last_departure: NaiveTime,
    pub headway_minutes: u32,
}

impl Schedule {
    /// Returns `Err` if the window is inverted or the headway is zero.
    pub fn new(
        first_departure: NaiveTime,
        last_departure: NaiveTime,
        headway_minutes: u32,
    ) -> Result<Self> {
        if last_departure < first_departure {
            return Err(TransitError::InvalidData(format!(
                "Last departure ({}) before first departure ({})",
                last_departure, first_departure
            )));
        }
        if headway_minutes == 0 {
            return Err(TransitError::InvalidData(
                "Headway must be at least one minute".to_string(),
            ));
        }
        Ok(Self {
            first_departure,
            last_departure,
            headway_minutes,
        })
    }

    /// Parse from "HH:MM" departure bounds.
    pub fn parse(first: &str, last: &str, headway_minutes: u32) -> Result<Self> {
        let first_departure = parse_departure(first)?;
        let last_departure = parse_departure(last)?;
        Self::new(first_departure, last_departure, headway_minutes)
    }

    /// First departure as minutes since midnight.
    pub fn first_minute(&self) -> u32 {
        minutes_since_midnight(self.first_departure)
    }

    /// Last departure as minutes since midnight.
    pub fn last_minute(&self) -> u32 {
        minutes_since_midnight(self.last_departure)
    }
}

fn parse_departure(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| TransitError::InvalidData(format!("Bad departure time {:?}: {}", value, e)))
}

fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Line not found: {0}")]
    LineNotFound(LineIdentifier),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_schedule_validation() {
        let ok = Schedule::new(t(6, 0), t(22, 0), 15).unwrap();
        assert_eq!(ok.first_minute(), 360);
        assert_eq!(ok.last_minute(), 1320);

        // Inverted window
        assert!(Schedule::new(t(22, 0), t(6, 0), 15).is_err());
        // Zero headway
        assert!(Schedule::new(t(6, 0), t(22, 0), 0).is_err());
        // Single-departure window is allowed
        assert!(Schedule::new(t(6, 0), t(6, 0), 15).is_ok());
    }

    #[test]
    fn test_schedule_parse() {
        let schedule = Schedule::parse("06:30", "23:45", 20).unwrap();
        assert_eq!(schedule.first_minute(), 390);
        assert_eq!(schedule.last_minute(), 1425);

        assert!(Schedule::parse("6 am", "22:00", 20).is_err());
        assert!(Schedule::parse("06:00", "", 20).is_err());
    }

    #[test]
    fn test_mode_predicates() {
        assert!(TransitMode::Bus.uses_street_routing());
        assert!(!TransitMode::Bus.is_fixed_guideway());
        assert!(TransitMode::Tram.is_fixed_guideway());
        assert!(TransitMode::Metro.is_fixed_guideway());
        assert!(!TransitMode::Metro.uses_street_routing());
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!(TransitMode::from_str("Bus").unwrap(), TransitMode::Bus);
        assert_eq!(TransitMode::from_str("metro").unwrap(), TransitMode::Metro);
        assert!(TransitMode::from_str("ferry").is_err());
        assert_eq!(TransitMode::Tram.to_string(), "tram");
    }

    #[test]
    fn test_travel_directions() {
        assert_eq!(
            ServiceDirection::Both.travel_directions(),
            &[TravelDirection::Outbound, TravelDirection::Inbound]
        );
        assert_eq!(
            ServiceDirection::Outbound.travel_directions(),
            &[TravelDirection::Outbound]
        );
        assert!(TravelDirection::Inbound.is_reversed());
        assert!(!TravelDirection::Outbound.is_reversed());
    }

    #[test]
    fn test_direction_defaults() {
        assert_eq!(
            ServiceDirection::default_for(TransitMode::Metro),
            ServiceDirection::Both
        );
        assert_eq!(
            ServiceDirection::default_for(TransitMode::Tram),
            ServiceDirection::Both
        );
        assert_eq!(
            ServiceDirection::default_for(TransitMode::Bus),
            ServiceDirection::Outbound
        );
    }
}
