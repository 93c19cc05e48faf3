//! Upstream precipitation feeds.
//!
//! [`PrecipitationFeed`] is the seam the acquisition chain calls through;
//! [`OpenMeteoPrecipitationFeed`] is the HTTP implementation.

use async_trait::async_trait;
use backcountry_signal_models::Coordinate;
use backcountry_source::retry::{self, RetryPolicy};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::PrecipitationError;
use crate::series::HourlySeries;
use crate::summary::PrecipitationPayload;

/// Days of history requested alongside the live forecast.
const LIVE_PAST_DAYS: u32 = 3;
/// Days of forecast requested; covers a 24 hour look-ahead from late in
/// the current day.
const LIVE_FORECAST_DAYS: u32 = 3;

/// Source of hourly precipitation payloads.
#[async_trait]
pub trait PrecipitationFeed: Send + Sync {
    /// Live forecast plus recent history around now.
    ///
    /// # Errors
    ///
    /// Returns [`PrecipitationError`] once every host and attempt failed.
    async fn fetch_live(&self, coord: &Coordinate) -> Result<PrecipitationPayload, PrecipitationError>;

    /// Archived observations for `start..=end` (UTC dates).
    ///
    /// # Errors
    ///
    /// Returns [`PrecipitationError`] if the archive call fails.
    async fn fetch_archive(
        &self,
        coord: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PrecipitationPayload, PrecipitationError>;
}

/// Open-Meteo forecast (mirrored hosts) and archive endpoints.
#[derive(Debug, Clone)]
pub struct OpenMeteoPrecipitationFeed {
    client: reqwest::Client,
    live_hosts: Vec<String>,
    live_policy: RetryPolicy,
    archive_host: String,
    archive_policy: RetryPolicy,
}

impl OpenMeteoPrecipitationFeed {
    #[must_use]
    pub const fn new(
        client: reqwest::Client,
        live_hosts: Vec<String>,
        live_policy: RetryPolicy,
        archive_host: String,
        archive_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            live_hosts,
            live_policy,
            archive_host,
            archive_policy,
        }
    }
}

#[async_trait]
impl PrecipitationFeed for OpenMeteoPrecipitationFeed {
    async fn fetch_live(&self, coord: &Coordinate) -> Result<PrecipitationPayload, PrecipitationError> {
        let query = [
            ("latitude", coord.lat.to_string()),
            ("longitude", coord.lon.to_string()),
            ("hourly", "rain,showers,snowfall".to_string()),
            ("precipitation_unit", "inch".to_string()),
            ("timezone", "GMT".to_string()),
            ("past_days", LIVE_PAST_DAYS.to_string()),
            ("forecast_days", LIVE_FORECAST_DAYS.to_string()),
        ];
        let (body, host) = retry::send_json_mirrored(
            &self.live_hosts,
            |host| self.client.get(format!("{host}/v1/forecast")).query(&query),
            &self.live_policy,
        )
        .await?;
        log::debug!("Live precipitation for {coord} answered by {host}");
        parse_hourly_payload(&body)
    }

    async fn fetch_archive(
        &self,
        coord: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PrecipitationPayload, PrecipitationError> {
        let url = format!("{}/v1/archive", self.archive_host);
        let query = [
            ("latitude", coord.lat.to_string()),
            ("longitude", coord.lon.to_string()),
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
            ("hourly", "rain,snowfall".to_string()),
            ("precipitation_unit", "inch".to_string()),
            ("timezone", "GMT".to_string()),
        ];
        let body = retry::send_json(|| self.client.get(&url).query(&query), &self.archive_policy).await?;
        parse_hourly_payload(&body)
    }
}

/// Parses an Open-Meteo `hourly` block into rain and snow series.
///
/// Showers, when present, are folded into rain.
///
/// # Errors
///
/// Returns [`PrecipitationError::MissingField`] if `hourly.time` or both
/// value arrays are absent, or [`PrecipitationError::Series`] if the
/// arrays disagree.
pub fn parse_hourly_payload(body: &Value) -> Result<PrecipitationPayload, PrecipitationError> {
    let hourly = body
        .get("hourly")
        .ok_or(PrecipitationError::MissingField { field: "hourly" })?;
    let time = hourly
        .get("time")
        .and_then(Value::as_array)
        .ok_or(PrecipitationError::MissingField { field: "hourly.time" })?
        .iter()
        .map(parse_hour)
        .collect::<Option<Vec<_>>>()
        .ok_or(PrecipitationError::MissingField { field: "hourly.time" })?;

    let rain = values(hourly, "rain");
    let showers = values(hourly, "showers");
    let snow = values(hourly, "snowfall");
    if rain.is_none() && snow.is_none() {
        return Err(PrecipitationError::MissingField {
            field: "hourly.rain",
        });
    }

    let series = |v: Option<Vec<Option<f64>>>| {
        let v = v.unwrap_or_else(|| vec![None; time.len()]);
        HourlySeries::new(time.clone(), v)
    };

    let mut rain_series = series(rain)?;
    if let Some(showers) = showers {
        rain_series = rain_series.combined_with(&series(Some(showers))?);
    }

    Ok(PrecipitationPayload {
        rain: rain_series,
        snow: series(snow)?,
    })
}

fn values(hourly: &Value, key: &str) -> Option<Vec<Option<f64>>> {
    hourly
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().map(Value::as_f64).collect())
}

fn parse_hour(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M")
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)))
}
