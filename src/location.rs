/// Monitored location registry for the air quality service.
///
/// Defines the single location sampled by the scheduled ingestion job.
/// This is the one source of truth for its coordinates: other modules
/// reference `PARIS` rather than hardcoding longitude/latitude.

use crate::model::Coordinate;

// ---------------------------------------------------------------------------
// Location metadata
// ---------------------------------------------------------------------------

/// Metadata for a location whose readings are persisted every tick.
pub struct MonitoredLocation {
    /// Short identifier used in log lines and route names.
    pub name: &'static str,
    /// Human-readable description of what the location represents.
    pub description: &'static str,
    /// WGS84 longitude.
    pub longitude: f64,
    /// WGS84 latitude.
    pub latitude: f64,
}

impl MonitoredLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            longitude: self.longitude,
            latitude: self.latitude,
        }
    }
}

/// Central Paris. The provider resolves it to its nearest city station.
pub static PARIS: MonitoredLocation = MonitoredLocation {
    name: "paris",
    description: "Central Paris (Notre-Dame / Hotel de Ville). Source of the \
                  historical most-polluted-time query.",
    longitude: 2.352222,
    latitude: 48.856613,
};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paris_coordinates_are_exact() {
        let c = PARIS.coordinate();
        assert_eq!(c.longitude, 2.352222);
        assert_eq!(c.latitude, 48.856613);
    }

    #[test]
    fn paris_is_a_valid_wgs84_point() {
        let c = PARIS.coordinate();
        assert!(Coordinate::new(c.longitude, c.latitude).is_some());
        assert!(c.is_on_earth());
    }

    #[test]
    fn swapped_axes_would_not_be_paris() {
        // Longitude comes first everywhere in this crate.
        let swapped = Coordinate {
            longitude: PARIS.latitude,
            latitude: PARIS.longitude,
        };
        assert_ne!(swapped, PARIS.coordinate());
    }
}
