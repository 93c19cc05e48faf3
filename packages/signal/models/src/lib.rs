#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalized signal records shared across the backcountry risk pipeline.
//!
//! Every upstream provider (weather, avalanche, precipitation, snowpack,
//! alerts, air quality, fire weather) is normalized into one of the record
//! types in this crate before the scoring core sees it. Each record carries
//! an explicit [`SignalStatus`] so that degraded data is never mistaken for
//! a favorable reading.

pub mod report;
pub mod score;
pub mod signals;
pub mod weather;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use report::SafetyReport;
pub use score::{
    ConfidenceReason, GroupImpact, HazardFactor, HazardGroup, SafetyRating, SafetyScoreResult,
};
pub use signals::{
    AccumulationWindow, AirQualitySignal, AlertSeverity, AlertsSignal, AvalancheSignal,
    FireRiskLevel, FireRiskSignal, HistoricalComparison, HistoricalStatus, OfficialAlert,
    PrecipitationSignal, PrecipitationSource, PrecipitationWindows, SnowpackSignal,
    ZoneMatchMode,
};
pub use weather::{
    FieldSource, TemperatureContext, VisibilityLevel, VisibilityRisk, WeatherField, WeatherPoint,
    WeatherRecord,
};

/// A validated WGS84 coordinate.
///
/// Construct through [`Coordinate::new`], which rejects non-finite values
/// and out-of-range latitudes/longitudes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinate")]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub lon: f64,
}

#[derive(Deserialize)]
struct RawCoordinate {
    lat: f64,
    lon: f64,
}

impl TryFrom<RawCoordinate> for Coordinate {
    type Error = InvalidCoordinateError;

    fn try_from(raw: RawCoordinate) -> Result<Self, Self::Error> {
        Self::new(raw.lat, raw.lon)
    }
}

impl Coordinate {
    /// Creates a coordinate after range validation.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either value is non-finite or
    /// outside its valid range.
    pub fn new(lat: f64, lon: f64) -> Result<Self, InvalidCoordinateError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(InvalidCoordinateError { lat, lon });
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(InvalidCoordinateError { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    /// Cache key with both components rounded to two decimals (~1 km).
    ///
    /// Nearby requests share cache entries through this key.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{:.2},{:.2}", self.lat, self.lon)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4},{:.4}", self.lat, self.lon)
    }
}

/// Error returned when a latitude/longitude pair fails range validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The rejected latitude.
    pub lat: f64,
    /// The rejected longitude.
    pub lon: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid coordinate ({}, {}): expected finite lat in [-90, 90] and lon in [-180, 180]",
            self.lat, self.lon
        )
    }
}

impl std::error::Error for InvalidCoordinateError {}

/// Availability status carried by every normalized signal record.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalStatus {
    /// The provider answered with complete data.
    Ok,
    /// The provider answered but some expected fields were missing.
    Partial,
    /// The provider answered but had nothing for this location.
    NoData,
    /// Every acquisition attempt failed.
    #[default]
    Unavailable,
    /// Data exists but does not cover the selected start time.
    NoneForSelectedStart,
    /// The provider is seasonal and is not currently publishing.
    OffSeason,
}

impl SignalStatus {
    /// Whether the record carries usable values.
    #[must_use]
    pub const fn has_data(self) -> bool {
        matches!(self, Self::Ok | Self::Partial)
    }

    /// Whether the upstream feed failed outright.
    #[must_use]
    pub const fn is_unavailable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_out_of_range_values() {
        assert!(Coordinate::new(39.5, -106.0).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn coordinate_deserialization_validates() {
        let ok: Result<Coordinate, _> = serde_json::from_str(r#"{"lat": 40.0, "lon": -105.5}"#);
        assert!(ok.is_ok());
        let bad: Result<Coordinate, _> = serde_json::from_str(r#"{"lat": 140.0, "lon": -105.5}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn cache_key_rounds_to_two_decimals() {
        let a = Coordinate::new(39.6012, -105.9488).unwrap();
        let b = Coordinate::new(39.6049, -105.9451).unwrap();
        assert_eq!(a.cache_key(), "39.60,-105.95");
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&SignalStatus::NoneForSelectedStart).unwrap();
        assert_eq!(json, "\"none_for_selected_start\"");
        assert_eq!(SignalStatus::NoData.to_string(), "no_data");
        assert!(SignalStatus::Partial.has_data());
        assert!(!SignalStatus::OffSeason.has_data());
    }
}
