#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalizers for the concrete upstream feeds.
//!
//! Each feed is reduced to one of the normalized signal records before the
//! scoring core sees it. The traits here are the seams the pipeline calls
//! through:
//!
//! - [`WeatherProvider`]: [`nws::NwsHourlyForecast`] (primary) and
//!   [`open_meteo::OpenMeteoForecast`] (secondary)
//! - [`AlertsProvider`]: [`alerts::NwsAlerts`]
//! - [`AirQualityProvider`]: [`air_quality::OpenMeteoAirQuality`]
//!
//! Fire risk is derived locally in [`fire`] from weather and alerts.

pub mod air_quality;
pub mod alerts;
pub mod fire;
pub mod nws;
pub mod open_meteo;
pub mod record;

use async_trait::async_trait;
use backcountry_signal_models::{AirQualitySignal, AlertsSignal, Coordinate, WeatherRecord};
use backcountry_source::SourceError;
use backcountry_source::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Errors from provider fetches and normalization.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload did not have the expected shape.
    #[error("Normalization error: {message}")]
    Normalization { message: String },
}

impl ProviderError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::Normalization {
            message: format!("missing '{field}'"),
        }
    }
}

/// Hourly weather forecast for a point.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    /// Short provider name recorded in [`WeatherRecord::source`].
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`ProviderError`] if the feed cannot be fetched or parsed.
    async fn fetch_weather(
        &self,
        coord: &Coordinate,
        start: DateTime<Utc>,
        window_hours: u32,
    ) -> Result<WeatherRecord, ProviderError>;
}

/// Active official alerts for a point.
#[async_trait]
pub trait AlertsProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the feed cannot be fetched or parsed.
    async fn fetch_alerts(&self, coord: &Coordinate) -> Result<AlertsSignal, ProviderError>;
}

/// Air quality for a point at a given hour.
#[async_trait]
pub trait AirQualityProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the feed cannot be fetched or parsed.
    async fn fetch_air_quality(
        &self,
        coord: &Coordinate,
        at: DateTime<Utc>,
    ) -> Result<AirQualitySignal, ProviderError>;
}

/// Client, base URL and retry bounds shared by the HTTP providers.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub client: reqwest::Client,
    pub base_url: String,
    pub policy: RetryPolicy,
}

impl Endpoint {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }
}

pub(crate) fn f64_at(value: &Value, pointer: &str) -> Option<f64> {
    value.pointer(pointer).and_then(Value::as_f64)
}

pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn time_at(value: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    str_at(value, pointer)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
