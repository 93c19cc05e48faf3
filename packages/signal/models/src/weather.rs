//! Hourly weather records and per-field provenance.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SignalStatus;

/// One forecast hour. Every field is optional: a missing value means the
/// provider did not report it, never that it was zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherPoint {
    /// Start of the forecast hour.
    pub time: Option<DateTime<Utc>>,
    /// Air temperature (°F).
    pub temperature_f: Option<f64>,
    /// Apparent ("feels like") temperature (°F).
    pub apparent_temperature_f: Option<f64>,
    /// Sustained wind speed (mph).
    pub wind_speed_mph: Option<f64>,
    /// Wind gust speed (mph).
    pub wind_gust_mph: Option<f64>,
    /// Cardinal wind direction (e.g. `"NW"`).
    pub wind_direction: Option<String>,
    /// Relative humidity (%).
    pub humidity_pct: Option<f64>,
    /// Dew point (°F).
    pub dew_point_f: Option<f64>,
    /// Mean sea-level pressure (hPa).
    pub pressure_hpa: Option<f64>,
    /// Total cloud cover (%).
    pub cloud_cover_pct: Option<f64>,
    /// Probability of precipitation (%).
    pub precipitation_chance_pct: Option<f64>,
    /// Short human-readable forecast text.
    pub description: Option<String>,
    /// Whether the hour falls in daylight.
    pub is_daytime: Option<bool>,
}

impl WeatherPoint {
    /// Highest of sustained wind and gust, if either is known.
    #[must_use]
    pub fn peak_wind_mph(&self) -> Option<f64> {
        match (self.wind_speed_mph, self.wind_gust_mph) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Apparent temperature, falling back to the air temperature.
    #[must_use]
    pub fn feels_like_f(&self) -> Option<f64> {
        self.apparent_temperature_f.or(self.temperature_f)
    }

    /// Lower-cased description, empty when missing.
    #[must_use]
    pub fn description_lower(&self) -> String {
        self.description
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }
}

/// Minimum and maximum temperature over the hours following the target hour.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureContext {
    /// Lowest temperature in the window (°F).
    pub min_f: f64,
    /// Highest temperature in the window (°F).
    pub max_f: f64,
    /// Number of hours the window actually covered.
    pub hours: usize,
}

/// Five-level bucket for the visibility risk score.
#[derive(
    Debug,
    Clone,
    Copy,
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
pub enum VisibilityLevel {
    /// Score below 20.
    Minimal,
    /// Score 20-39.
    Low,
    /// Score 40-59.
    Moderate,
    /// Score 60-79.
    High,
    /// Score 80 and above.
    Extreme,
}

impl VisibilityLevel {
    /// Buckets a 0-100 score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0..=19 => Self::Minimal,
            20..=39 => Self::Low,
            40..=59 => Self::Moderate,
            60..=79 => Self::High,
            _ => Self::Extreme,
        }
    }
}

/// Derived visibility assessment, always recomputed from the record it
/// is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRisk {
    /// Weighted score, 0-100.
    pub score: u8,
    /// Bucketed level.
    pub level: VisibilityLevel,
    /// Human-readable contributing signals, in scoring order.
    pub factors: Vec<String>,
    /// Trend hours carrying at least one visibility risk signal.
    pub active_hours: usize,
}

/// Which side of a merge supplied a field.
#[derive(
    Debug,
    Clone,
    Copy,
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
pub enum FieldSource {
    /// Supplied by the primary provider.
    Primary,
    /// Missing from the primary, copied from the secondary provider.
    Secondary,
    /// Filled row-by-row from the secondary provider's trend.
    BlendedTrend,
}

/// Keys of the provenance map on [`WeatherRecord`].
#[derive(
    Debug,
    Clone,
    Copy,
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
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum WeatherField {
    /// Target-hour wind direction.
    WindDirection,
    /// Forecast issuance time.
    IssuedAt,
    /// Location timezone.
    Timezone,
    /// End of the forecast horizon.
    ForecastEndTime,
    /// Target-hour dew point.
    DewPoint,
    /// 24-hour temperature context.
    TemperatureContext,
    /// Target-hour cloud cover.
    CloudCover,
    /// Target-hour pressure.
    Pressure,
    /// The hourly trend as a whole.
    Trend,
    /// Per-row pressure inside the trend.
    TrendPressure,
}

/// A normalized weather record for the selected start hour plus the
/// following travel-window hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherRecord {
    /// Availability of this record.
    pub status: SignalStatus,
    /// Provider that supplied the base record.
    pub source: String,
    /// Provider that filled gaps during fusion, if any.
    pub secondary_source: Option<String>,
    /// When the provider issued the forecast.
    pub issued_at: Option<DateTime<Utc>>,
    /// IANA timezone of the location.
    pub timezone: Option<String>,
    /// Last hour covered by the forecast.
    pub forecast_end_time: Option<DateTime<Utc>>,
    /// Conditions for the selected start hour.
    pub current: WeatherPoint,
    /// Temperature range over the 24 hours from the selected start.
    pub temperature_context: Option<TemperatureContext>,
    /// Hours after the selected start, in order.
    pub trend: Vec<WeatherPoint>,
    /// Derived visibility assessment.
    pub visibility_risk: Option<VisibilityRisk>,
    /// Which provider supplied each merged field.
    pub provenance: BTreeMap<WeatherField, FieldSource>,
}

impl WeatherRecord {
    /// An empty record signalling that every acquisition attempt failed.
    #[must_use]
    pub fn unavailable(source: impl Into<String>) -> Self {
        Self {
            status: SignalStatus::Unavailable,
            source: source.into(),
            ..Self::default()
        }
    }
}
