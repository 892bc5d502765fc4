//! Day/night gate for light commands.

use chrono::DateTime;
use chrono::Utc;
use sunrise::Coordinates;
use sunrise::SolarDay;
use sunrise::SolarEvent;

/// Predicate guarding whether light commands are issued at all.
pub trait Dusk: Send {
    fn is_dark(&self) -> bool;
}

/// Sunset gate for a fixed location: dark from today's sunset until today's
/// sunrise.
#[derive(Debug, Clone, Copy)]
pub struct SolarGate {
    latitude: f64,
    longitude: f64,
}

impl SolarGate {
    /// Coordinates are validated at configuration time; out-of-range values
    /// never reach this constructor in practice.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether `now` falls between sunset and sunrise for this location.
    pub fn is_dark_at(&self, now: DateTime<Utc>) -> bool {
        let Some(coordinates) = Coordinates::new(self.latitude, self.longitude) else {
            // Unrepresentable coordinates: assume daylight so the controller
            // never switches the light on spuriously.
            return false;
        };

        let day = SolarDay::new(coordinates, now.date_naive());
        let sunrise = day.event_time(SolarEvent::Sunrise);
        let sunset = day.event_time(SolarEvent::Sunset);

        now >= sunset || now <= sunrise
    }
}

impl Dusk for SolarGate {
    fn is_dark(&self) -> bool {
        self.is_dark_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn london() -> SolarGate {
        SolarGate::new(51.5, -0.1)
    }

    #[test]
    fn test_midsummer_noon_is_light() {
        let noon = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        assert!(!london().is_dark_at(noon));
    }

    #[test]
    fn test_midsummer_late_evening_is_dark() {
        // Sunset in London on the solstice is around 20:20 UTC.
        let late = Utc.with_ymd_and_hms(2024, 6, 21, 23, 30, 0).unwrap();
        assert!(london().is_dark_at(late));
    }

    #[test]
    fn test_winter_noon_is_light() {
        let noon = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert!(!london().is_dark_at(noon));
    }

    #[test]
    fn test_winter_early_morning_is_dark() {
        // Well before the ~08:00 UTC January sunrise.
        let early = Utc.with_ymd_and_hms(2024, 1, 15, 3, 0, 0).unwrap();
        assert!(london().is_dark_at(early));
    }

    #[test]
    fn test_midnight_is_dark() {
        let midnight = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert!(london().is_dark_at(midnight));
    }

    #[test]
    fn test_invalid_coordinates_assume_daylight() {
        let gate = SolarGate::new(120.0, 0.0);
        let midnight = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();
        assert!(!gate.is_dark_at(midnight));
    }
}
