//! Confidence in the composed score.
//!
//! Starts at 100 and loses additive penalties for stale or missing inputs.
//! The result never drops below [`MIN_CONFIDENCE`].

use backcountry_signal_models::{ConfidenceReason, PrecipitationSource, SignalStatus};
use chrono::Duration;

use crate::SafetySignals;

pub const MAX_CONFIDENCE: u32 = 100;
pub const MIN_CONFIDENCE: u32 = 20;

#[derive(Debug, Default)]
struct Penalties {
    reasons: Vec<ConfidenceReason>,
}

impl Penalties {
    fn add(&mut self, penalty: u32, reason: impl Into<String>) {
        if penalty > 0 {
            self.reasons.push(ConfidenceReason {
                reason: reason.into(),
                penalty,
            });
        }
    }

    fn total(&self) -> u32 {
        self.reasons.iter().map(|r| r.penalty).sum()
    }
}

fn age_penalty(age: Duration, tiers: &[(i64, u32)]) -> u32 {
    tiers
        .iter()
        .find(|(hours, _)| age > Duration::hours(*hours))
        .map_or(0, |(_, penalty)| *penalty)
}

/// Confidence value and the itemized penalties behind it.
#[must_use]
pub fn assess_confidence(signals: &SafetySignals<'_>) -> (u8, Vec<ConfidenceReason>) {
    let mut penalties = Penalties::default();
    let now = signals.now;

    let weather = signals.weather;
    if weather.status.has_data() {
        if let Some(issued) = weather.issued_at {
            let age = now - issued;
            penalties.add(
                age_penalty(age, &[(12, 15), (6, 8)]),
                format!("Weather forecast was issued {} hours ago", age.num_hours()),
            );
        }

        let window = usize::try_from(signals.travel_window_hours).unwrap_or(usize::MAX);
        let depth = weather.trend.len();
        let trend_penalty = if depth * 2 < window {
            10
        } else if depth < window {
            5
        } else {
            0
        };
        penalties.add(
            trend_penalty,
            format!("Hourly trend covers {depth} of {window} travel hours"),
        );
    }

    let avalanche = signals.avalanche;
    if avalanche.status.has_data()
        && let Some(published) = avalanche.published_at
    {
        let age = now - published;
        penalties.add(
            age_penalty(age, &[(48, 18), (24, 10)]),
            format!("Avalanche bulletin is {} hours old", age.num_hours()),
        );
    }

    let precip = signals.precipitation;
    if precip.fallback_mode {
        penalties.add(10, "Precipitation history unavailable; totals are placeholders");
    } else if precip.source == PrecipitationSource::StaleCache {
        penalties.add(10, "Precipitation history served from an expired cache");
    } else if let Some(fetched) = precip.fetched_at {
        let age = now - fetched;
        penalties.add(
            age_penalty(age, &[(3, 6)]),
            format!("Precipitation data is {} hours old", age.num_hours()),
        );
    }

    let lead = signals.selected_start - now;
    penalties.add(
        age_penalty(lead, &[(48, 10), (24, 5)]),
        format!("Selected start is {} hours away", lead.num_hours()),
    );

    let feeds: [(&str, SignalStatus, u32); 6] = [
        ("Weather", weather.status, 30),
        ("Avalanche", avalanche.status, 20),
        ("Alerts", signals.alerts.status, 10),
        ("Snowpack", signals.snowpack.status, 5),
        ("Air quality", signals.air_quality.status, 5),
        ("Fire weather", signals.fire.status, 5),
    ];
    for (name, status, penalty) in feeds {
        if status.is_unavailable() {
            penalties.add(penalty, format!("{name} data unavailable"));
        }
    }

    let confidence = MAX_CONFIDENCE
        .saturating_sub(penalties.total())
        .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
    (
        u8::try_from(confidence).unwrap_or(u8::MAX),
        penalties.reasons,
    )
}
