//! The single response record returned for one assessment request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AirQualitySignal, AlertsSignal, AvalancheSignal, Coordinate, FireRiskSignal,
    PrecipitationSignal, SafetyScoreResult, SnowpackSignal, WeatherRecord,
};

/// Every signal gathered for a request plus the composed score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyReport {
    /// Assessed location.
    pub coordinate: Coordinate,
    /// Requested travel start.
    pub selected_start: DateTime<Utc>,
    /// Requested travel window (hours).
    pub travel_window_hours: u32,
    /// When the report was assembled.
    pub generated_at: DateTime<Utc>,
    /// Fused weather record.
    pub weather: WeatherRecord,
    /// Avalanche forecast.
    pub avalanche: AvalancheSignal,
    /// Precipitation accumulations.
    pub precipitation: PrecipitationSignal,
    /// Snowpack comparison.
    pub snowpack: SnowpackSignal,
    /// Official alerts.
    pub alerts: AlertsSignal,
    /// Air quality.
    pub air_quality: AirQualitySignal,
    /// Fire-weather assessment.
    pub fire: FireRiskSignal,
    /// Composite score and confidence.
    pub safety: SafetyScoreResult,
}
