//! NRCS AWDB REST client for SNOTEL stations and daily SWE.

use async_trait::async_trait;
use backcountry_source::retry::{self, RetryPolicy};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::SnowpackError;
use crate::baseline::StationObservation;

/// A SNOTEL station reporting snow-water equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnotelStation {
    /// `"<id>:<state>:SNTL"`
    pub station_triplet: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
}

/// Source of station metadata and daily SWE history.
#[async_trait]
pub trait SnowpackFeed: Send + Sync {
    /// # Errors
    ///
    /// Returns [`SnowpackError`] if the station list cannot be fetched.
    async fn fetch_stations(&self) -> Result<Vec<SnotelStation>, SnowpackError>;

    /// Daily SWE (inches) for `begin..=end`.
    ///
    /// # Errors
    ///
    /// Returns [`SnowpackError`] if the history cannot be fetched.
    async fn fetch_daily_swe(
        &self,
        station_triplet: &str,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StationObservation>, SnowpackError>;
}

/// [`SnowpackFeed`] backed by the AWDB REST API.
#[derive(Debug, Clone)]
pub struct AwdbSnowpackFeed {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
}

impl AwdbSnowpackFeed {
    #[must_use]
    pub const fn new(client: reqwest::Client, base_url: String, policy: RetryPolicy) -> Self {
        Self {
            client,
            base_url,
            policy,
        }
    }
}

#[async_trait]
impl SnowpackFeed for AwdbSnowpackFeed {
    async fn fetch_stations(&self) -> Result<Vec<SnotelStation>, SnowpackError> {
        let url = format!("{}/stations", self.base_url);
        let body = retry::send_json(
            || {
                self.client.get(&url).query(&[
                    ("networkCds", "SNTL"),
                    ("elements", "WTEQ"),
                    ("activeOnly", "true"),
                    ("returnStationElements", "false"),
                ])
            },
            &self.policy,
        )
        .await?;
        parse_stations(body)
    }

    async fn fetch_daily_swe(
        &self,
        station_triplet: &str,
        begin: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<StationObservation>, SnowpackError> {
        let url = format!("{}/data", self.base_url);
        let begin = begin.to_string();
        let end = end.to_string();
        let body = retry::send_json(
            || {
                self.client.get(&url).query(&[
                    ("stationTriplets", station_triplet),
                    ("elements", "WTEQ"),
                    ("duration", "DAILY"),
                    ("beginDate", begin.as_str()),
                    ("endDate", end.as_str()),
                ])
            },
            &self.policy,
        )
        .await?;
        parse_daily_values(&body)
    }
}

/// Parses the station list, dropping entries without usable coordinates.
///
/// # Errors
///
/// Returns [`SnowpackError::UnexpectedShape`] if the payload is not an
/// array.
pub fn parse_stations(body: Value) -> Result<Vec<SnotelStation>, SnowpackError> {
    let Value::Array(items) = body else {
        return Err(SnowpackError::UnexpectedShape {
            message: "station list is not an array".to_string(),
        });
    };
    let total = items.len();
    let stations: Vec<SnotelStation> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .filter(|s: &SnotelStation| s.latitude.is_finite() && s.longitude.is_finite())
        .collect();
    if stations.len() < total {
        log::debug!("Dropped {} unreadable SNOTEL stations", total - stations.len());
    }
    Ok(stations)
}

/// Flattens `[{stationTriplet, data: [{values: [{date, value}]}]}]` into
/// observations sorted by date.
///
/// # Errors
///
/// Returns [`SnowpackError::UnexpectedShape`] if the payload is not an
/// array.
pub fn parse_daily_values(body: &Value) -> Result<Vec<StationObservation>, SnowpackError> {
    let stations = body.as_array().ok_or_else(|| SnowpackError::UnexpectedShape {
        message: "data response is not an array".to_string(),
    })?;

    let mut observations: Vec<StationObservation> = stations
        .iter()
        .filter_map(|s| s.get("data").and_then(Value::as_array))
        .flatten()
        .filter_map(|element| element.get("values").and_then(Value::as_array))
        .flatten()
        .filter_map(|v| {
            let date = v.get("date").and_then(Value::as_str)?;
            let date = NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()?;
            let value = v.get("value").and_then(Value::as_f64)?;
            Some(StationObservation { date, value })
        })
        .collect();
    observations.sort_by_key(|o| o.date);
    Ok(observations)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_station_list() {
        let body = json!([
            {
                "stationTriplet": "335:CO:SNTL",
                "name": "Berthoud Summit",
                "latitude": 39.8,
                "longitude": -105.78,
                "elevation": 11300.0
            },
            { "stationTriplet": "bad", "name": "No coords" }
        ]);
        let stations = parse_stations(body).unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].station_triplet, "335:CO:SNTL");
        assert_eq!(stations[0].elevation, Some(11300.0));
    }

    #[test]
    fn station_list_must_be_array() {
        assert!(matches!(
            parse_stations(json!({ "error": "nope" })),
            Err(SnowpackError::UnexpectedShape { .. })
        ));
    }

    #[test]
    fn parses_daily_values_sorted() {
        let body = json!([{
            "stationTriplet": "335:CO:SNTL",
            "data": [{
                "stationElement": { "elementCode": "WTEQ" },
                "values": [
                    { "date": "2025-02-02", "value": 12.4 },
                    { "date": "2025-02-01", "value": 12.1 },
                    { "date": "2025-02-03" },
                    { "date": "2025-02-04 00:00", "value": 12.9 }
                ]
            }]
        }]);
        let obs = parse_daily_values(&body).unwrap();
        assert_eq!(obs.len(), 3);
        assert_eq!(obs[0].date, NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert!((obs[2].value - 12.9).abs() < f64::EPSILON);
    }
}
