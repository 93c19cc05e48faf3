#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Field-level merge of weather records from two providers.
//!
//! The primary record wins wherever it has a value. Gaps in a fixed set of
//! fields are filled from the secondary record, and every one of those
//! fields is tagged in the record's provenance map. Visibility risk is
//! always recomputed from the merged result.

pub mod visibility;

use backcountry_signal_models::{FieldSource, WeatherField, WeatherRecord};

/// Primary trends shorter than this are replaced wholesale by a longer
/// secondary trend.
pub const MIN_PRIMARY_TREND_LEN: usize = 6;

/// Merges `secondary` into the gaps of `primary`.
///
/// An unavailable secondary contributes nothing, but the provenance map and
/// visibility risk are still rebuilt.
#[must_use]
pub fn fuse_weather(primary: &WeatherRecord, secondary: &WeatherRecord) -> WeatherRecord {
    let mut merged = primary.clone();
    let usable = secondary.status.has_data();
    let current = &secondary.current;

    let mut provenance = vec![
        (
            WeatherField::WindDirection,
            fill_text(&mut merged.current.wind_direction, current.wind_direction.as_ref(), usable),
        ),
        (
            WeatherField::IssuedAt,
            fill(&mut merged.issued_at, secondary.issued_at.as_ref(), usable),
        ),
        (
            WeatherField::Timezone,
            fill_text(&mut merged.timezone, secondary.timezone.as_ref(), usable),
        ),
        (
            WeatherField::ForecastEndTime,
            fill(&mut merged.forecast_end_time, secondary.forecast_end_time.as_ref(), usable),
        ),
        (
            WeatherField::DewPoint,
            fill(&mut merged.current.dew_point_f, current.dew_point_f.as_ref(), usable),
        ),
        (
            WeatherField::TemperatureContext,
            fill(
                &mut merged.temperature_context,
                secondary.temperature_context.as_ref(),
                usable,
            ),
        ),
        (
            WeatherField::CloudCover,
            fill(&mut merged.current.cloud_cover_pct, current.cloud_cover_pct.as_ref(), usable),
        ),
        (
            WeatherField::Pressure,
            fill(&mut merged.current.pressure_hpa, current.pressure_hpa.as_ref(), usable),
        ),
    ];

    let replace_trend = usable
        && merged.trend.len() < MIN_PRIMARY_TREND_LEN
        && secondary.trend.len() > merged.trend.len();
    if replace_trend {
        log::debug!(
            "Replacing {}-hour {} trend with {}-hour {} trend",
            merged.trend.len(),
            merged.source,
            secondary.trend.len(),
            secondary.source
        );
        merged.trend.clone_from(&secondary.trend);
    }
    provenance.push((WeatherField::Trend, source_of(replace_trend)));

    let trend_pressure = if replace_trend {
        FieldSource::Secondary
    } else if usable && blend_trend_pressure(&mut merged, secondary) > 0 {
        FieldSource::BlendedTrend
    } else {
        FieldSource::Primary
    };
    provenance.push((WeatherField::TrendPressure, trend_pressure));

    if provenance.iter().any(|(_, s)| *s != FieldSource::Primary) {
        merged.secondary_source = Some(secondary.source.clone());
    }
    merged.provenance = provenance.into_iter().collect();

    merged.visibility_risk = Some(visibility::assess_visibility(&merged.current, &merged.trend));
    merged
}

const fn source_of(from_secondary: bool) -> FieldSource {
    if from_secondary {
        FieldSource::Secondary
    } else {
        FieldSource::Primary
    }
}

/// Copies `other` into an empty `target`.
fn fill<T: Clone>(target: &mut Option<T>, other: Option<&T>, usable: bool) -> FieldSource {
    let take = usable && target.is_none() && other.is_some();
    if take {
        *target = other.cloned();
    }
    source_of(take)
}

/// Like [`fill`], treating whitespace-only text as missing on both sides.
fn fill_text(target: &mut Option<String>, other: Option<&String>, usable: bool) -> FieldSource {
    let take = usable
        && is_blank(target.as_deref())
        && !is_blank(other.map(String::as_str));
    if take {
        *target = other.cloned();
    }
    source_of(take)
}

/// Fills missing trend pressure row by row from the matching secondary row.
/// Rows pair by position and are skipped when both carry differing times.
/// Returns the number of rows filled.
fn blend_trend_pressure(merged: &mut WeatherRecord, secondary: &WeatherRecord) -> usize {
    let mut filled = 0;
    for (row, other) in merged.trend.iter_mut().zip(&secondary.trend) {
        if row.pressure_hpa.is_some() || other.pressure_hpa.is_none() {
            continue;
        }
        if let (Some(a), Some(b)) = (row.time, other.time)
            && a != b
        {
            continue;
        }
        row.pressure_hpa = other.pressure_hpa;
        filled += 1;
    }
    filled
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}
