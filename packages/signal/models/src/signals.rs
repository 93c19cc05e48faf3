//! Normalized records for the non-weather signal producers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::SignalStatus;

/// How a coordinate was matched to a forecast zone.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZoneMatchMode {
    /// The coordinate lies inside the zone polygon.
    Polygon,
    /// The coordinate lies outside every polygon but near this zone.
    Nearest,
    /// No zone covers or neighbors the coordinate.
    #[default]
    None,
}

/// Avalanche forecast for the zone covering the coordinate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvalancheSignal {
    /// Availability of this record.
    pub status: SignalStatus,
    /// Forecast center identifier (e.g. `"CAIC"`).
    pub center_id: Option<String>,
    /// Forecast zone name.
    pub zone_name: Option<String>,
    /// How the zone was matched.
    pub match_mode: ZoneMatchMode,
    /// Distance to the matched zone for nearest matches (km).
    pub fallback_distance_km: Option<f64>,
    /// Danger rating, 0-5. Absent when the zone is not rated.
    pub danger_level: Option<u8>,
    /// Danger label as published (e.g. `"considerable"`).
    pub danger_label: Option<String>,
    /// Travel advice text.
    pub travel_advice: Option<String>,
    /// Link to the full bulletin.
    pub link: Option<String>,
    /// When the bulletin was published.
    pub published_at: Option<DateTime<Utc>>,
    /// When the bulletin expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AvalancheSignal {
    /// A record signalling that the zone layer could not be acquired.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }
}

/// A summed precipitation window anchored at a timestamp.
///
/// `total` is `None` when no samples fell in the window ("unknown"), which
/// is distinct from `Some(0.0)` ("none observed").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulationWindow {
    /// Window anchor (end of a look-back window, start of a look-ahead).
    pub anchor: DateTime<Utc>,
    /// Window length in hours.
    pub window_hours: u32,
    /// Summed amount (inches), or `None` when unknown.
    pub total: Option<f64>,
}

/// Look-back and look-ahead windows for one precipitation type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecipitationWindows {
    /// Trailing 12 hours.
    pub past_12h: AccumulationWindow,
    /// Trailing 24 hours.
    pub past_24h: AccumulationWindow,
    /// Trailing 48 hours.
    pub past_48h: AccumulationWindow,
    /// The travel window ahead.
    pub ahead: AccumulationWindow,
}

/// Which tier of the acquisition chain produced the payload.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrecipitationSource {
    /// Live forecast + recent history endpoint.
    Live,
    /// Fresh in-memory cache.
    Cache,
    /// Historical archive endpoint.
    Archive,
    /// Cache entry served past its TTL.
    StaleCache,
    /// Every tier failed; values are placeholders.
    #[default]
    Fallback,
}

/// Rain and snow accumulations around the selected start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecipitationSignal {
    /// Availability of this record.
    pub status: SignalStatus,
    /// Acquisition tier that supplied the data.
    pub source: PrecipitationSource,
    /// `true` when the zero values are placeholders, not observations.
    pub fallback_mode: bool,
    /// When the underlying payload was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    /// Liquid precipitation windows (inches).
    pub rain: PrecipitationWindows,
    /// Snowfall windows (inches).
    pub snow: PrecipitationWindows,
}

/// Snowpack position relative to the multi-year baseline.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoricalStatus {
    /// At or below 80% of the average.
    BelowAverage,
    /// Between 80% and 120% of the average.
    AtAverage,
    /// At or above 120% of the average.
    AboveAverage,
    /// No usable average or current value.
    #[default]
    Unknown,
}

/// Comparison of a current station reading against its same-day-of-year
/// multi-year average.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalComparison {
    /// The reading being compared.
    pub current_value: Option<f64>,
    /// Mean of the per-year samples.
    pub average_value: Option<f64>,
    /// Number of years that contributed a sample.
    pub sample_count: usize,
    /// Number of years searched.
    pub years_considered: u32,
    /// Largest day offset among the samples used.
    pub max_offset_days: u32,
    /// Classification of the current reading.
    pub status: HistoricalStatus,
    /// Current reading as a rounded percentage of the average.
    pub percent_of_average: Option<f64>,
}

impl HistoricalComparison {
    /// Plain-language statement of the comparison, if it is known.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let percent = self.percent_of_average?;
        Some(format!(
            "Current snowpack is {percent:.0}% of typical for this date"
        ))
    }
}

/// Snowpack station reading with its historical comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnowpackSignal {
    /// Availability of this record.
    pub status: SignalStatus,
    /// Station identifier (e.g. `"335:CO:SNTL"`).
    pub station_id: Option<String>,
    /// Station name.
    pub station_name: Option<String>,
    /// Distance from the coordinate to the station (km).
    pub distance_km: Option<f64>,
    /// Date of the current reading.
    pub observed_on: Option<NaiveDate>,
    /// Current snow-water equivalent (inches).
    pub snow_water_equivalent_in: Option<f64>,
    /// Comparison against the station's history.
    pub comparison: Option<HistoricalComparison>,
    /// Plain-language summary.
    pub summary: Option<String>,
}

/// Official alert severity, ordered from least to most severe.
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
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AlertSeverity {
    /// Severity not stated.
    #[default]
    Unknown,
    /// Minimal threat.
    Minor,
    /// Possible threat.
    Moderate,
    /// Significant threat.
    Severe,
    /// Extraordinary threat.
    Extreme,
}

/// One active official alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialAlert {
    /// Event name (e.g. `"Winter Storm Warning"`).
    pub event: String,
    /// Headline text.
    pub headline: Option<String>,
    /// Severity.
    pub severity: AlertSeverity,
    /// When the hazard begins.
    pub onset: Option<DateTime<Utc>>,
    /// When the alert stops being valid.
    pub expires: Option<DateTime<Utc>>,
    /// Issuing office.
    pub sender: Option<String>,
}

impl OfficialAlert {
    /// Whether the alert is in force at `at`.
    ///
    /// A missing onset means "already in force"; a missing expiry means
    /// "until further notice".
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.onset.is_none_or(|onset| onset <= at) && self.expires.is_none_or(|end| at < end)
    }
}

/// Active official alerts for the coordinate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertsSignal {
    /// Availability of this record.
    pub status: SignalStatus,
    /// Alerts as published, in provider order.
    pub alerts: Vec<OfficialAlert>,
}

impl AlertsSignal {
    /// Alerts in force at `at`, most severe first (stable for ties).
    #[must_use]
    pub fn valid_at(&self, at: DateTime<Utc>) -> Vec<&OfficialAlert> {
        let mut valid: Vec<&OfficialAlert> =
            self.alerts.iter().filter(|a| a.is_valid_at(at)).collect();
        valid.sort_by(|a, b| b.severity.cmp(&a.severity));
        valid
    }
}

/// Air quality at the selected start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AirQualitySignal {
    /// Availability of this record.
    pub status: SignalStatus,
    /// US EPA air quality index.
    pub us_aqi: Option<u32>,
    /// Fine particulate matter (µg/m³).
    pub pm2_5: Option<f64>,
    /// EPA category label.
    pub category: Option<String>,
    /// Hour the values refer to.
    pub observed_at: Option<DateTime<Utc>>,
}

/// Fire-weather risk tier.
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
pub enum FireRiskLevel {
    /// No notable fire-weather signal.
    #[default]
    Low,
    /// Dry and warm.
    Moderate,
    /// Dry with wind, or a fire weather watch.
    High,
    /// Critically dry and windy.
    VeryHigh,
    /// Red flag warning in force.
    Extreme,
}

/// Fire-weather assessment for the selected start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireRiskSignal {
    /// Availability of this record.
    pub status: SignalStatus,
    /// Risk tier, when assessable.
    pub level: Option<FireRiskLevel>,
    /// Signals that produced the tier.
    pub reasons: Vec<String>,
}
