//! Look-back and look-ahead precipitation windows from one payload.

use backcountry_signal_models::{
    AccumulationWindow, PrecipitationSignal, PrecipitationSource, PrecipitationWindows,
    SignalStatus,
};
use chrono::{DateTime, Utc};

use crate::series::{AccumulationMode, HourlySeries, accumulate};

/// Look-back window lengths in hours.
pub const LOOK_BACK_HOURS: [u32; 3] = [12, 24, 48];

/// Hourly rain (liquid, showers included) and snowfall, in inches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrecipitationPayload {
    pub rain: HourlySeries,
    pub snow: HourlySeries,
}

/// Builds rain and snow windows around `anchor`: 12/24/48 hour look-backs
/// and a `window_hours` look-ahead, all from the same series.
///
/// Status is `ok` when every window has samples, `partial` when some do
/// and `no_data` when none do.
#[must_use]
pub fn summarize_precipitation(
    payload: &PrecipitationPayload,
    anchor: DateTime<Utc>,
    window_hours: u32,
    source: PrecipitationSource,
    fetched_at: Option<DateTime<Utc>>,
) -> PrecipitationSignal {
    let rain = windows(&payload.rain, anchor, window_hours);
    let snow = windows(&payload.snow, anchor, window_hours);

    let totals = [rain, snow]
        .iter()
        .flat_map(|w| [w.past_12h, w.past_24h, w.past_48h, w.ahead])
        .map(|w| w.total.is_some())
        .collect::<Vec<_>>();
    let status = if totals.iter().all(|known| *known) {
        SignalStatus::Ok
    } else if totals.iter().any(|known| *known) {
        SignalStatus::Partial
    } else {
        SignalStatus::NoData
    };

    PrecipitationSignal {
        status,
        source,
        fallback_mode: false,
        fetched_at,
        rain,
        snow,
    }
}

/// The tagged zero-valued signal used when every acquisition tier failed.
#[must_use]
pub fn fallback_signal(anchor: DateTime<Utc>, window_hours: u32) -> PrecipitationSignal {
    let zero = zero_windows(anchor, window_hours);
    PrecipitationSignal {
        status: SignalStatus::Unavailable,
        source: PrecipitationSource::Fallback,
        fallback_mode: true,
        fetched_at: None,
        rain: zero,
        snow: zero,
    }
}

fn windows(series: &HourlySeries, anchor: DateTime<Utc>, window_hours: u32) -> PrecipitationWindows {
    let [h12, h24, h48] = LOOK_BACK_HOURS.map(|hours| AccumulationWindow {
        anchor,
        window_hours: hours,
        total: accumulate(series, anchor, hours, AccumulationMode::Rolling),
    });
    PrecipitationWindows {
        past_12h: h12,
        past_24h: h24,
        past_48h: h48,
        ahead: AccumulationWindow {
            anchor,
            window_hours,
            total: accumulate(series, anchor, window_hours, AccumulationMode::Forward),
        },
    }
}

fn zero_windows(anchor: DateTime<Utc>, window_hours: u32) -> PrecipitationWindows {
    let window = |hours| AccumulationWindow {
        anchor,
        window_hours: hours,
        total: Some(0.0),
    };
    PrecipitationWindows {
        past_12h: window(12),
        past_24h: window(24),
        past_48h: window(48),
        ahead: window(window_hours),
    }
}
