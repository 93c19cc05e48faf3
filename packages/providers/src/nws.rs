//! National Weather Service hourly forecast (primary weather).
//!
//! Two calls: `/points/{lat},{lon}` resolves the grid and its
//! `forecastHourly` URL and time zone, then the hourly forecast itself.

use async_trait::async_trait;
use backcountry_signal_models::{Coordinate, WeatherPoint, WeatherRecord};
use backcountry_source::retry;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::record::{ForecastMeta, build_weather_record};
use crate::{Endpoint, ProviderError, WeatherProvider, f64_at, str_at, time_at};

pub const SOURCE_NAME: &str = "nws";

const GEO_JSON: &str = "application/geo+json";

#[derive(Debug, Clone)]
pub struct NwsHourlyForecast {
    endpoint: Endpoint,
}

impl NwsHourlyForecast {
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    async fn get(&self, url: &str) -> Result<Value, ProviderError> {
        let client = &self.endpoint.client;
        Ok(retry::send_json(
            || client.get(url).header(reqwest::header::ACCEPT, GEO_JSON),
            &self.endpoint.policy,
        )
        .await?)
    }
}

#[async_trait]
impl WeatherProvider for NwsHourlyForecast {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_weather(
        &self,
        coord: &Coordinate,
        start: DateTime<Utc>,
        window_hours: u32,
    ) -> Result<WeatherRecord, ProviderError> {
        let points_url = format!(
            "{}/points/{:.4},{:.4}",
            self.endpoint.base_url, coord.lat, coord.lon
        );
        log::debug!("Resolving NWS grid for {coord}");
        let points = self.get(&points_url).await?;
        let hourly_url = str_at(&points, "/properties/forecastHourly")
            .ok_or_else(|| ProviderError::missing("properties.forecastHourly"))?
            .to_string();
        let timezone = str_at(&points, "/properties/timeZone").map(ToString::to_string);

        let forecast = self.get(&hourly_url).await?;
        normalize_hourly(&forecast, timezone, start, window_hours)
    }
}

/// Normalizes an hourly forecast payload.
///
/// # Errors
///
/// Returns [`ProviderError::Normalization`] if `properties.periods` is
/// missing.
pub fn normalize_hourly(
    forecast: &Value,
    timezone: Option<String>,
    start: DateTime<Utc>,
    window_hours: u32,
) -> Result<WeatherRecord, ProviderError> {
    let periods = forecast
        .pointer("/properties/periods")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::missing("properties.periods"))?;

    let hours: Vec<WeatherPoint> = periods.iter().map(parse_period).collect();
    let meta = ForecastMeta {
        issued_at: time_at(forecast, "/properties/updateTime")
            .or_else(|| time_at(forecast, "/properties/generatedAt")),
        timezone,
        forecast_end_time: periods.last().and_then(|p| time_at(p, "/endTime")),
    };

    Ok(build_weather_record(SOURCE_NAME, hours, meta, start, window_hours))
}

fn parse_period(period: &Value) -> WeatherPoint {
    let temperature_f = f64_at(period, "/temperature").map(|t| {
        if str_at(period, "/temperatureUnit") == Some("C") {
            celsius_to_fahrenheit(t)
        } else {
            t
        }
    });

    WeatherPoint {
        time: time_at(period, "/startTime"),
        temperature_f,
        apparent_temperature_f: None,
        wind_speed_mph: str_at(period, "/windSpeed").and_then(parse_wind_mph),
        wind_gust_mph: str_at(period, "/windGust").and_then(parse_wind_mph),
        wind_direction: str_at(period, "/windDirection").map(ToString::to_string),
        humidity_pct: f64_at(period, "/relativeHumidity/value"),
        dew_point_f: quantity_fahrenheit(period.get("dewpoint")),
        pressure_hpa: None,
        cloud_cover_pct: None,
        precipitation_chance_pct: f64_at(period, "/probabilityOfPrecipitation/value"),
        description: str_at(period, "/shortForecast").map(ToString::to_string),
        is_daytime: period.get("isDaytime").and_then(Value::as_bool),
    }
}

/// Parses wind strings such as `"15 mph"` or `"10 to 15 mph"`, taking the
/// upper end of a range.
#[must_use]
pub fn parse_wind_mph(text: &str) -> Option<f64> {
    text.split(|c: char| !c.is_ascii_digit() && c != '.')
        .filter_map(|part| part.parse::<f64>().ok())
        .reduce(f64::max)
}

/// Reads an NWS quantity (`{unitCode, value}`) as Fahrenheit.
fn quantity_fahrenheit(quantity: Option<&Value>) -> Option<f64> {
    let quantity = quantity?;
    let value = f64_at(quantity, "/value")?;
    let unit = str_at(quantity, "/unitCode").unwrap_or("wmoUnit:degC");
    if unit.ends_with("degF") {
        Some(value)
    } else {
        Some(celsius_to_fahrenheit(value))
    }
}

#[must_use]
pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c.mul_add(9.0 / 5.0, 32.0)
}

#[cfg(test)]
mod tests {
    use backcountry_signal_models::SignalStatus;
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;

    fn forecast() -> Value {
        json!({
            "properties": {
                "updateTime": "2025-01-20T10:02:11+00:00",
                "periods": [
                    {
                        "startTime": "2025-01-20T05:00:00-07:00",
                        "endTime": "2025-01-20T06:00:00-07:00",
                        "isDaytime": false,
                        "temperature": 18,
                        "temperatureUnit": "F",
                        "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": 40 },
                        "dewpoint": { "unitCode": "wmoUnit:degC", "value": -10.0 },
                        "relativeHumidity": { "unitCode": "wmoUnit:percent", "value": 72 },
                        "windSpeed": "10 to 15 mph",
                        "windDirection": "WNW",
                        "shortForecast": "Chance Light Snow"
                    },
                    {
                        "startTime": "2025-01-20T06:00:00-07:00",
                        "endTime": "2025-01-20T07:00:00-07:00",
                        "isDaytime": false,
                        "temperature": 17,
                        "temperatureUnit": "F",
                        "windSpeed": "20 mph",
                        "windGust": "35 mph",
                        "windDirection": "W",
                        "shortForecast": "Light Snow"
                    }
                ]
            }
        })
    }

    #[test]
    fn normalizes_hourly_periods() {
        let start = Utc.with_ymd_and_hms(2025, 1, 20, 12, 30, 0).unwrap();
        let record =
            normalize_hourly(&forecast(), Some("America/Denver".to_string()), start, 6).unwrap();

        assert_eq!(record.status, SignalStatus::Ok);
        assert_eq!(record.source, "nws");
        assert_eq!(record.timezone.as_deref(), Some("America/Denver"));
        assert_eq!(
            record.issued_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 20, 10, 2, 11).unwrap())
        );
        assert_eq!(
            record.current.time,
            Some(Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap())
        );
        assert_eq!(record.current.wind_speed_mph, Some(15.0));
        assert_eq!(record.current.wind_direction.as_deref(), Some("WNW"));
        assert!((record.current.dew_point_f.unwrap() - 14.0).abs() < 1e-9);
        assert_eq!(record.trend.len(), 1);
        assert_eq!(record.trend[0].wind_gust_mph, Some(35.0));
        assert_eq!(
            record.forecast_end_time,
            Some(Utc.with_ymd_and_hms(2025, 1, 20, 14, 0, 0).unwrap())
        );
    }

    #[test]
    fn missing_periods_is_an_error() {
        let err = normalize_hourly(&json!({ "properties": {} }), None, Utc::now(), 6).unwrap_err();
        assert!(matches!(err, ProviderError::Normalization { .. }));
    }

    #[test]
    fn wind_strings() {
        assert_eq!(parse_wind_mph("10 to 15 mph"), Some(15.0));
        assert_eq!(parse_wind_mph("5 mph"), Some(5.0));
        assert_eq!(parse_wind_mph("calm"), None);
    }

    #[test]
    fn temperature_conversion() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(-40.0) + 40.0).abs() < 1e-9);
    }
}
