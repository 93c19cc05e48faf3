//! Shared weather record builder.
//!
//! Both weather normalizers reduce their feed to hourly [`WeatherPoint`]s
//! and hand them here to pick the target hour, the trend for the travel
//! window and the 24 hour temperature context.

use backcountry_fusion::visibility::assess_visibility;
use backcountry_signal_models::{
    SignalStatus, TemperatureContext, WeatherPoint, WeatherRecord,
};
use chrono::{DateTime, Duration, Utc};

/// Feed-level metadata carried into the record.
#[derive(Debug, Clone, Default)]
pub struct ForecastMeta {
    pub issued_at: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub forecast_end_time: Option<DateTime<Utc>>,
}

/// Builds a record for `start` from unordered hourly points.
///
/// The target hour is the last point at or before `start` (or the first
/// point when it begins less than an hour after `start`). A start outside
/// the forecast yields `none_for_selected_start`; an empty forecast yields
/// `no_data`.
#[must_use]
pub fn build_weather_record(
    source: &str,
    mut hours: Vec<WeatherPoint>,
    meta: ForecastMeta,
    start: DateTime<Utc>,
    window_hours: u32,
) -> WeatherRecord {
    hours.retain(|p| p.time.is_some());
    hours.sort_by_key(|p| p.time);

    let base = WeatherRecord {
        source: source.to_string(),
        issued_at: meta.issued_at,
        timezone: meta.timezone,
        forecast_end_time: meta
            .forecast_end_time
            .or_else(|| hours.last().and_then(|p| p.time).map(|t| t + Duration::hours(1))),
        ..WeatherRecord::default()
    };

    let Some(index) = target_index(&hours, start) else {
        let status = if hours.is_empty() {
            SignalStatus::NoData
        } else {
            SignalStatus::NoneForSelectedStart
        };
        return WeatherRecord { status, ..base };
    };

    let current = hours[index].clone();
    let window = usize::try_from(window_hours).unwrap_or(usize::MAX);
    let trend: Vec<WeatherPoint> = hours.iter().skip(index + 1).take(window).cloned().collect();
    let temperature_context = current.time.and_then(|t| temperature_context(&hours[index..], t));

    let status = if current.temperature_f.is_some() && current.peak_wind_mph().is_some() {
        SignalStatus::Ok
    } else {
        SignalStatus::Partial
    };
    let visibility_risk = Some(assess_visibility(&current, &trend));

    WeatherRecord {
        status,
        current,
        temperature_context,
        trend,
        visibility_risk,
        ..base
    }
}

fn target_index(hours: &[WeatherPoint], start: DateTime<Utc>) -> Option<usize> {
    let first = hours.first()?.time?;
    let last = hours.last()?.time?;
    if start >= last + Duration::hours(1) {
        return None;
    }
    if start < first {
        return (first - start < Duration::hours(1)).then_some(0);
    }
    hours.iter().rposition(|p| p.time.is_some_and(|t| t <= start))
}

fn temperature_context(hours: &[WeatherPoint], from: DateTime<Utc>) -> Option<TemperatureContext> {
    let until = from + Duration::hours(24);
    let temps: Vec<f64> = hours
        .iter()
        .filter(|p| p.time.is_some_and(|t| t >= from && t < until))
        .filter_map(|p| p.temperature_f)
        .collect();
    if temps.is_empty() {
        return None;
    }
    Some(TemperatureContext {
        min_f: temps.iter().copied().fold(f64::INFINITY, f64::min),
        max_f: temps.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        hours: temps.len(),
    })
}
