//! Open-Meteo hourly forecast (secondary weather).

use async_trait::async_trait;
use backcountry_signal_models::{Coordinate, WeatherPoint, WeatherRecord};
use backcountry_source::retry;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::record::{ForecastMeta, build_weather_record};
use crate::{Endpoint, ProviderError, WeatherProvider, str_at};

pub const SOURCE_NAME: &str = "open-meteo";

const HOURLY_FIELDS: &str = "temperature_2m,apparent_temperature,relative_humidity_2m,\
dew_point_2m,precipitation_probability,weather_code,pressure_msl,cloud_cover,\
wind_speed_10m,wind_gusts_10m,wind_direction_10m,is_day";

const FORECAST_DAYS: u32 = 7;

#[derive(Debug, Clone)]
pub struct OpenMeteoForecast {
    endpoint: Endpoint,
}

impl OpenMeteoForecast {
    #[must_use]
    pub const fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoForecast {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_weather(
        &self,
        coord: &Coordinate,
        start: DateTime<Utc>,
        window_hours: u32,
    ) -> Result<WeatherRecord, ProviderError> {
        let url = format!("{}/v1/forecast", self.endpoint.base_url);
        let query = [
            ("latitude", coord.lat.to_string()),
            ("longitude", coord.lon.to_string()),
            ("hourly", HOURLY_FIELDS.to_string()),
            ("temperature_unit", "fahrenheit".to_string()),
            ("wind_speed_unit", "mph".to_string()),
            ("timeformat", "unixtime".to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ];
        log::debug!("Fetching Open-Meteo forecast for {coord}");
        let client = &self.endpoint.client;
        let body =
            retry::send_json(|| client.get(&url).query(&query), &self.endpoint.policy).await?;
        normalize_forecast(&body, start, window_hours, Utc::now())
    }
}

/// Normalizes an Open-Meteo `hourly` payload requested with
/// `timeformat=unixtime`. The feed carries no issue time, so `fetched_at`
/// stands in for it.
///
/// # Errors
///
/// Returns [`ProviderError::Normalization`] if `hourly.time` is missing.
pub fn normalize_forecast(
    body: &Value,
    start: DateTime<Utc>,
    window_hours: u32,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherRecord, ProviderError> {
    let hourly = body.get("hourly").ok_or_else(|| ProviderError::missing("hourly"))?;
    let times = hourly
        .get("time")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::missing("hourly.time"))?;

    let column = |key: &str, i: usize| -> Option<f64> {
        hourly.get(key)?.as_array()?.get(i)?.as_f64()
    };

    let hours: Vec<WeatherPoint> = times
        .iter()
        .enumerate()
        .map(|(i, t)| WeatherPoint {
            time: t.as_i64().and_then(|secs| DateTime::from_timestamp(secs, 0)),
            temperature_f: column("temperature_2m", i),
            apparent_temperature_f: column("apparent_temperature", i),
            wind_speed_mph: column("wind_speed_10m", i),
            wind_gust_mph: column("wind_gusts_10m", i),
            wind_direction: column("wind_direction_10m", i).map(|d| cardinal(d).to_string()),
            humidity_pct: column("relative_humidity_2m", i),
            dew_point_f: column("dew_point_2m", i),
            pressure_hpa: column("pressure_msl", i),
            cloud_cover_pct: column("cloud_cover", i),
            precipitation_chance_pct: column("precipitation_probability", i),
            description: column("weather_code", i)
                .and_then(|code| weather_code_description(code)),
            is_daytime: column("is_day", i).map(|d| d >= 1.0),
        })
        .collect();

    let forecast_end_time = hours
        .last()
        .and_then(|p| p.time)
        .map(|t| t + Duration::hours(1));
    let meta = ForecastMeta {
        issued_at: Some(fetched_at),
        timezone: str_at(body, "/timezone").map(ToString::to_string),
        forecast_end_time,
    };

    Ok(build_weather_record(SOURCE_NAME, hours, meta, start, window_hours))
}

/// Sixteen-point compass direction for a bearing in degrees.
#[must_use]
pub fn cardinal(degrees: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let normalized = degrees.rem_euclid(360.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = ((normalized / 22.5).round() as usize) % 16;
    POINTS[index]
}

/// Text for a WMO weather interpretation code.
#[must_use]
pub fn weather_code_description(code: f64) -> Option<String> {
    #[allow(clippy::cast_possible_truncation)]
    let text = match code.round() as i64 {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => return None,
    };
    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use backcountry_signal_models::SignalStatus;
    use chrono::TimeZone as _;
    use serde_json::json;

    use super::*;

    #[test]
    fn compass_points() {
        assert_eq!(cardinal(0.0), "N");
        assert_eq!(cardinal(22.5), "NNE");
        assert_eq!(cardinal(90.0), "E");
        assert_eq!(cardinal(200.0), "SSW");
        assert_eq!(cardinal(350.0), "N");
        assert_eq!(cardinal(-90.0), "W");
    }

    #[test]
    fn weather_codes() {
        assert_eq!(weather_code_description(45.0).as_deref(), Some("Fog"));
        assert_eq!(weather_code_description(75.0).as_deref(), Some("Heavy snow fall"));
        assert!(weather_code_description(12.0).is_none());
    }

    #[test]
    fn normalizes_hourly_columns() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap();
        let body = json!({
            "timezone": "America/Denver",
            "hourly": {
                "time": [t0.timestamp(), t0.timestamp() + 3600, t0.timestamp() + 7200],
                "temperature_2m": [21.0, 22.5, 24.0],
                "apparent_temperature": [9.0, 10.0, null],
                "wind_speed_10m": [12.0, 14.0, 16.0],
                "wind_gusts_10m": [25.0, 30.0, 32.0],
                "wind_direction_10m": [270.0, 280.0, 290.0],
                "relative_humidity_2m": [80.0, 82.0, 85.0],
                "dew_point_2m": [16.0, 17.0, 18.0],
                "pressure_msl": [1011.0, 1010.0, 1009.0],
                "cloud_cover": [100.0, 90.0, 70.0],
                "precipitation_probability": [60.0, 50.0, 20.0],
                "weather_code": [73, 71, 3],
                "is_day": [1, 1, 1]
            }
        });
        let record = normalize_forecast(&body, t0, 6, t0).unwrap();

        assert_eq!(record.status, SignalStatus::Ok);
        assert_eq!(record.source, "open-meteo");
        assert_eq!(record.timezone.as_deref(), Some("America/Denver"));
        assert_eq!(record.issued_at, Some(t0));
        assert_eq!(record.current.wind_direction.as_deref(), Some("W"));
        assert_eq!(record.current.description.as_deref(), Some("Moderate snow fall"));
        assert_eq!(record.current.is_daytime, Some(true));
        assert_eq!(record.current.pressure_hpa, Some(1011.0));
        assert_eq!(record.trend.len(), 2);
        assert!(record.trend[1].apparent_temperature_f.is_none());
        assert_eq!(record.forecast_end_time, Some(t0 + Duration::hours(3)));
        assert_eq!(record.temperature_context.unwrap().hours, 3);
    }

    #[test]
    fn missing_hourly_is_an_error() {
        assert!(normalize_forecast(&json!({}), Utc::now(), 6, Utc::now()).is_err());
    }
}
