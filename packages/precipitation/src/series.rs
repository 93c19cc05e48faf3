//! Hourly series and windowed accumulation.

use chrono::{DateTime, Duration, Utc};

/// Errors from building an [`HourlySeries`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("series has {times} timestamps but {values} values")]
    LengthMismatch { times: usize, values: usize },

    #[error("timestamp at index {index} precedes the one before it")]
    OutOfOrder { index: usize },
}

/// Parallel arrays of hourly timestamps and values.
///
/// Timestamps never decrease; gaps are allowed. A `None` value is a
/// missing sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HourlySeries {
    time: Vec<DateTime<Utc>>,
    value: Vec<Option<f64>>,
}

impl HourlySeries {
    /// # Errors
    ///
    /// * [`SeriesError::LengthMismatch`] if the arrays differ in length
    /// * [`SeriesError::OutOfOrder`] if a timestamp goes backwards
    pub fn new(time: Vec<DateTime<Utc>>, value: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        if time.len() != value.len() {
            return Err(SeriesError::LengthMismatch {
                times: time.len(),
                values: value.len(),
            });
        }
        if let Some(index) = time.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(SeriesError::OutOfOrder { index: index + 1 });
        }
        Ok(Self { time, value })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[must_use]
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.time
    }

    /// Adds `other` sample-wise where timestamps line up. Used to fold
    /// showers into rain. Samples present in only one series keep that
    /// value.
    #[must_use]
    pub fn combined_with(&self, other: &Self) -> Self {
        let value = self
            .time
            .iter()
            .zip(&self.value)
            .enumerate()
            .map(|(i, (t, v))| {
                let matching = (other.time.get(i) == Some(t))
                    .then(|| other.value.get(i).copied().flatten())
                    .flatten();
                match (v, matching) {
                    (Some(a), Some(b)) => Some(a + b),
                    (a, b) => a.or(b),
                }
            })
            .collect();
        Self {
            time: self.time.clone(),
            value,
        }
    }

    fn samples(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.time
            .iter()
            .zip(&self.value)
            .filter_map(|(t, v)| v.filter(|v| v.is_finite() && *v >= 0.0).map(|v| (*t, v)))
    }
}

/// Direction of an accumulation window relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationMode {
    /// `(anchor - window, anchor]`
    Rolling,
    /// `[anchor, anchor + window)`
    Forward,
}

/// Sums finite, non-negative samples inside the window.
///
/// Returns `None` when no valid sample falls inside, so "unknown" never
/// reads as "none observed".
#[must_use]
pub fn accumulate(
    series: &HourlySeries,
    anchor: DateTime<Utc>,
    window_hours: u32,
    mode: AccumulationMode,
) -> Option<f64> {
    let window = Duration::hours(i64::from(window_hours));
    let inside = |t: DateTime<Utc>| match mode {
        AccumulationMode::Rolling => t > anchor - window && t <= anchor,
        AccumulationMode::Forward => t >= anchor && t < anchor + window,
    };

    series
        .samples()
        .filter(|(t, _)| inside(*t))
        .map(|(_, v)| v)
        .fold(None, |acc, v| Some(acc.unwrap_or(0.0) + v))
}
