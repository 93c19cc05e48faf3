//! Same-day-of-year historical baseline for a station metric.

use backcountry_signal_models::{HistoricalComparison, HistoricalStatus};
use chrono::{Datelike, NaiveDate};

/// Ratio at or above which the current value is above average.
pub const ABOVE_AVERAGE_RATIO: f64 = 1.2;
/// Ratio at or below which the current value is below average.
pub const BELOW_AVERAGE_RATIO: f64 = 0.8;

/// One dated station reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationObservation {
    pub date: NaiveDate,
    pub value: f64,
}

/// Knobs for [`compare_with_options`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineOptions {
    /// Trailing years averaged, not counting the target year.
    pub years: u32,
    /// Search radius around each year's target day.
    pub max_offset_days: u32,
    /// Current reading; looked up in the history when absent.
    pub current_value: Option<f64>,
}

impl Default for BaselineOptions {
    fn default() -> Self {
        Self {
            years: 10,
            max_offset_days: 7,
            current_value: None,
        }
    }
}

/// Compares the reading at `target` against the trailing ten-year average
/// for the same day of year.
#[must_use]
pub fn compare_to_historical_baseline(
    history: &[StationObservation],
    target: NaiveDate,
) -> HistoricalComparison {
    compare_with_options(history, target, &BaselineOptions::default())
}

/// [`compare_to_historical_baseline`] with explicit options.
#[must_use]
pub fn compare_with_options(
    history: &[StationObservation],
    target: NaiveDate,
    options: &BaselineOptions,
) -> HistoricalComparison {
    let max_offset = i64::from(options.max_offset_days);
    let valid: Vec<&StationObservation> = history.iter().filter(|o| o.value.is_finite()).collect();

    let current_value = options.current_value.or_else(|| {
        valid
            .iter()
            .filter(|o| o.date <= target && (target - o.date).num_days() <= max_offset)
            .max_by_key(|o| o.date)
            .map(|o| o.value)
    });

    let samples: Vec<f64> = (1..=options.years)
        .filter_map(|back| {
            let year = target.year() - i32::try_from(back).ok()?;
            let day = same_day_in(year, target)?;
            closest_within(&valid, day, max_offset)
        })
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let average_value =
        (!samples.is_empty()).then(|| samples.iter().sum::<f64>() / samples.len() as f64);

    let ratio = match (current_value, average_value) {
        (Some(current), Some(average)) if average > 0.0 => Some(current / average),
        _ => None,
    };
    let status = match ratio {
        Some(r) if r >= ABOVE_AVERAGE_RATIO => HistoricalStatus::AboveAverage,
        Some(r) if r <= BELOW_AVERAGE_RATIO => HistoricalStatus::BelowAverage,
        Some(_) => HistoricalStatus::AtAverage,
        None => HistoricalStatus::Unknown,
    };

    HistoricalComparison {
        current_value,
        average_value,
        sample_count: samples.len(),
        years_considered: options.years,
        max_offset_days: options.max_offset_days,
        status,
        percent_of_average: ratio.map(|r| (r * 100.0).round()),
    }
}

/// `target`'s month and day in `year`; Feb 29 becomes Feb 28 in common
/// years.
fn same_day_in(year: i32, target: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, target.month(), target.day())
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
}

/// The latest observation at or before `day`, at most `max_offset` days
/// earlier.
fn closest_within(valid: &[&StationObservation], day: NaiveDate, max_offset: i64) -> Option<f64> {
    valid
        .iter()
        .filter(|o| o.date <= day && (day - o.date).num_days() <= max_offset)
        .max_by_key(|o| o.date)
        .map(|o| o.value)
}
