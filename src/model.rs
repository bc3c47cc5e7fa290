/// Reading, Coordinate, provider envelopes and AirQualityError
/// core data structures and error handling
///
/// Core data types for the air quality monitoring service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no I/O: only types, their serde shapes, and the closed error
/// taxonomy every component reports through.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Reading types
// ---------------------------------------------------------------------------

/// A single air-quality sample as reported by the provider.
///
/// Field names on the wire follow the provider's `pollution` object
/// (`ts`, `aqius`, `mainus`, `aqicn`, `maincn`), and the same shape is what
/// the HTTP surface returns. The timestamp is provider-supplied and stored
/// as-is; it is not the time this service received the sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(rename = "ts", with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// US AQI. The sole sort key for "most polluted".
    #[serde(rename = "aqius")]
    pub us_index: i32,
    #[serde(rename = "mainus")]
    pub us_main_pollutant: String,
    #[serde(rename = "aqicn")]
    pub cn_index: i32,
    #[serde(rename = "maincn")]
    pub cn_main_pollutant: String,
}

/// `{"Result": {"Pollution": Reading}}`, the body of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirQualityResponse {
    #[serde(rename = "Result")]
    pub result: PollutionResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollutionResult {
    #[serde(rename = "Pollution")]
    pub pollution: Reading,
}

impl From<Reading> for AirQualityResponse {
    fn from(pollution: Reading) -> Self {
        AirQualityResponse {
            result: PollutionResult { pollution },
        }
    }
}

/// Renders a timestamp the way every outward-facing payload does:
/// UTC, millisecond precision, `Z` suffix (`2023-09-15T23:00:00.000Z`).
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A (longitude, latitude) pair. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinate {
    /// Returns `None` unless both components are finite.
    pub fn new(longitude: f64, latitude: f64) -> Option<Self> {
        if longitude.is_finite() && latitude.is_finite() {
            Some(Coordinate { longitude, latitude })
        } else {
            None
        }
    }

    /// WGS84 range check. The provider is the authority on which points it
    /// serves; this is only used to sanity-check configured locations.
    pub fn is_on_earth(&self) -> bool {
        self.latitude.abs() <= 90.0 && self.longitude.abs() <= 180.0
    }
}

// ---------------------------------------------------------------------------
// Provider API envelope
// ---------------------------------------------------------------------------

/// `GET /v2/nearest_city` response, reduced to the fields we consume.
#[derive(Debug, Deserialize)]
pub struct NearestCityResponse {
    pub data: NearestCityData,
}

#[derive(Debug, Deserialize)]
pub struct NearestCityData {
    pub current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
pub struct CurrentConditions {
    pub pollution: Reading,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Message for coordinates the provider rejected with HTTP 400.
pub const INVALID_COORDINATES_MESSAGE: &str =
    "Invalid Longitude and or Latitude input, Check coordinates";

/// Message for non-finite coordinates caught before any request is made.
pub const NON_NUMERIC_COORDINATES_MESSAGE: &str = "Both longitude and latitude must be numbers.";

/// Context prefix for failed writes.
pub const SAVE_CONTEXT: &str = "Cannot Save Data";

/// Context prefix for failed reads.
pub const QUERY_CONTEXT: &str = "Cannot Get Data";

/// Errors that can arise when fetching, storing or querying readings.
///
/// "No rows" is not represented here: an empty store is a normal outcome
/// and surfaces as `Ok(None)` from the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AirQualityError {
    /// The coordinates were rejected, either locally (non-finite) or by the
    /// provider (its HTTP 400).
    #[error("{0}")]
    InvalidCoordinates(String),
    /// Transport failure, non-2xx status other than 400, or an unparseable body.
    #[error("API Request failed: {0}")]
    ProviderUnavailable(String),
    /// Any storage-layer failure.
    #[error("{context}: {message}")]
    Persistence {
        context: &'static str,
        message: String,
    },
}

impl AirQualityError {
    pub fn persistence(context: &'static str, err: impl std::fmt::Display) -> Self {
        AirQualityError::Persistence {
            context,
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_reading() -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2023, 9, 15, 23, 0, 0).unwrap(),
            us_index: 46,
            us_main_pollutant: "p2".to_string(),
            cn_index: 31,
            cn_main_pollutant: "n2".to_string(),
        }
    }

    #[test]
    fn reading_serializes_with_provider_field_names() {
        let value = serde_json::to_value(sample_reading()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "ts": "2023-09-15T23:00:00.000Z",
                "aqius": 46,
                "mainus": "p2",
                "aqicn": 31,
                "maincn": "n2",
            })
        );
    }

    #[test]
    fn nearest_city_body_parses_pollution_block() {
        let body = r#"{
            "status": "success",
            "data": {
                "city": "Paris",
                "current": {
                    "weather": {"ts": "2023-09-15T23:00:00.000Z", "tp": 19},
                    "pollution": {
                        "ts": "2023-09-15T23:00:00.000Z",
                        "aqius": 46,
                        "mainus": "p2",
                        "aqicn": 31,
                        "maincn": "n2"
                    }
                }
            }
        }"#;
        let parsed: NearestCityResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.current.pollution, sample_reading());
    }

    #[test]
    fn offset_timestamps_normalize_to_utc() {
        let reading: Reading = serde_json::from_str(
            r#"{"ts":"2023-09-16T01:00:00+02:00","aqius":1,"mainus":"o3","aqicn":1,"maincn":"o3"}"#,
        )
        .unwrap();
        assert_eq!(format_timestamp(&reading.timestamp), "2023-09-15T23:00:00.000Z");
    }

    #[test]
    fn response_envelope_matches_http_contract() {
        let value = serde_json::to_value(AirQualityResponse::from(sample_reading())).unwrap();
        assert_eq!(value["Result"]["Pollution"]["aqius"], 46);
        assert_eq!(value["Result"]["Pollution"]["ts"], "2023-09-15T23:00:00.000Z");
    }

    #[test]
    fn coordinate_rejects_non_finite() {
        assert!(Coordinate::new(f64::NAN, 1.0).is_none());
        assert!(Coordinate::new(1.0, f64::INFINITY).is_none());
        assert!(Coordinate::new(2.352222, 48.856613).is_some());
    }

    #[test]
    fn error_messages_carry_context() {
        let err = AirQualityError::ProviderUnavailable("Request Failed".to_string());
        assert_eq!(err.to_string(), "API Request failed: Request Failed");

        let err = AirQualityError::persistence(QUERY_CONTEXT, "connection reset");
        assert_eq!(err.to_string(), "Cannot Get Data: connection reset");

        let err = AirQualityError::InvalidCoordinates(INVALID_COORDINATES_MESSAGE.to_string());
        assert_eq!(err.to_string(), INVALID_COORDINATES_MESSAGE);
    }
}
