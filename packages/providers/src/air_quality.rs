//! Open-Meteo air quality.

use async_trait::async_trait;
use backcountry_signal_models::{AirQualitySignal, Coordinate, SignalStatus};
use backcountry_source::retry;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{AirQualityProvider, Endpoint, ProviderError};

#[derive(Debug, Clone)]
pub struct OpenMeteoAirQuality {
    endpoint: Endpoint,
}

impl OpenMeteoAirQuality {
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl AirQualityProvider for OpenMeteoAirQuality {
    async fn fetch_air_quality(
        &self,
        coord: &Coordinate,
        at: DateTime<Utc>,
    ) -> Result<AirQualitySignal, ProviderError> {
        let url = format!("{}/v1/air-quality", self.endpoint.base_url);
        let query = [
            ("latitude", coord.lat.to_string()),
            ("longitude", coord.lon.to_string()),
            ("hourly", "us_aqi,pm2_5".to_string()),
            ("timeformat", "unixtime".to_string()),
            ("forecast_days", "5".to_string()),
        ];
        let client = &self.endpoint.client;
        let body =
            retry::send_json(|| client.get(&url).query(&query), &self.endpoint.policy).await?;
        normalize_air_quality(&body, at)
    }
}

/// Picks the last hour at or before `at` from an hourly `us_aqi`/`pm2_5`
/// payload.
///
/// # Errors
///
/// Returns [`ProviderError::Normalization`] if `hourly.time` is missing.
pub fn normalize_air_quality(
    body: &Value,
    at: DateTime<Utc>,
) -> Result<AirQualitySignal, ProviderError> {
    let hourly = body.get("hourly").ok_or_else(|| ProviderError::missing("hourly"))?;
    let times = hourly
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::missing("hourly.time"))?;

    let index = times
        .iter()
        .enumerate()
        .filter_map(|(i, t)| Some((i, DateTime::from_timestamp(t.as_i64()?, 0)?)))
        .filter(|(_, t)| *t <= at)
        .max_by_key(|(_, t)| *t);

    let Some((index, observed_at)) = index else {
        return Ok(AirQualitySignal {
            status: if times.is_empty() {
                SignalStatus::NoData
            } else {
                SignalStatus::NoneForSelectedStart
            },
            ..AirQualitySignal::default()
        });
    };

    let column = |key: &str| hourly.get(key)?.as_array()?.get(index)?.as_f64();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let us_aqi = column("us_aqi").map(|v| v.max(0.0).round() as u32);
    let pm2_5 = column("pm2_5");

    let status = match (us_aqi, pm2_5) {
        (Some(_), Some(_)) => SignalStatus::Ok,
        (None, None) => SignalStatus::NoData,
        _ => SignalStatus::Partial,
    };

    Ok(AirQualitySignal {
        status,
        us_aqi,
        pm2_5,
        category: us_aqi.map(|aqi| aqi_category(aqi).to_string()),
        observed_at: Some(observed_at),
    })
}

/// EPA category label for a US AQI value.
#[must_use]
pub const fn aqi_category(aqi: u32) -> &'static str {
    match aqi {
        0..=50 => "Good",
        51..=100 => "Moderate",
        101..=150 => "Unhealthy for Sensitive Groups",
        151..=200 => "Unhealthy",
        201..=300 => "Very Unhealthy",
        _ => "Hazardous",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone as _};
    use serde_json::json;

    use super::*;

    fn payload(t0: DateTime<Utc>) -> Value {
        json!({
            "hourly": {
                "time": [t0.timestamp(), t0.timestamp() + 3600, t0.timestamp() + 7200],
                "us_aqi": [42, 158.4, null],
                "pm2_5": [8.1, 61.0, 12.0]
            }
        })
    }

    #[test]
    fn picks_hour_at_or_before() {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        let signal =
            normalize_air_quality(&payload(t0), t0 + Duration::minutes(90)).unwrap();

        assert_eq!(signal.status, SignalStatus::Ok);
        assert_eq!(signal.us_aqi, Some(158));
        assert_eq!(signal.category.as_deref(), Some("Unhealthy"));
        assert_eq!(signal.observed_at, Some(t0 + Duration::hours(1)));
    }

    #[test]
    fn missing_aqi_is_partial() {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        let signal = normalize_air_quality(&payload(t0), t0 + Duration::hours(5)).unwrap();
        assert_eq!(signal.status, SignalStatus::Partial);
        assert!(signal.us_aqi.is_none());
        assert!(signal.category.is_none());
    }

    #[test]
    fn start_before_series() {
        let t0 = Utc.with_ymd_and_hms(2025, 8, 1, 18, 0, 0).unwrap();
        let signal = normalize_air_quality(&payload(t0), t0 - Duration::hours(1)).unwrap();
        assert_eq!(signal.status, SignalStatus::NoneForSelectedStart);
    }

    #[test]
    fn categories() {
        assert_eq!(aqi_category(50), "Good");
        assert_eq!(aqi_category(101), "Unhealthy for Sensitive Groups");
        assert_eq!(aqi_category(301), "Hazardous");
    }
}
