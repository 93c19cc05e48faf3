//! Avalanche signal derivation from a resolved zone.

use backcountry_signal_models::{AvalancheSignal, SignalStatus};
use chrono::{DateTime, Utc};

use crate::ZoneMatch;

/// Builds the avalanche signal for a zone match and a selected start time.
///
/// A map-layer danger level of `-1` (or anything outside 0-5) means the
/// zone carries no rating and leaves `danger_level` empty. A bulletin
/// whose validity window does not contain `selected_start` reports
/// [`SignalStatus::NoneForSelectedStart`].
#[must_use]
pub fn avalanche_signal(zone: &ZoneMatch<'_>, selected_start: DateTime<Utc>) -> AvalancheSignal {
    let Some(feature) = zone.feature else {
        return AvalancheSignal {
            status: SignalStatus::NoData,
            match_mode: zone.mode,
            ..AvalancheSignal::default()
        };
    };

    let status = if feature.off_season {
        SignalStatus::OffSeason
    } else if feature.end_date.is_some_and(|end| end < selected_start)
        || feature.start_date.is_some_and(|begin| begin > selected_start)
    {
        SignalStatus::NoneForSelectedStart
    } else {
        SignalStatus::Ok
    };

    AvalancheSignal {
        status,
        center_id: Some(feature.center_id.clone()).filter(|c| !c.is_empty()),
        zone_name: Some(feature.name.clone()).filter(|n| !n.is_empty()),
        match_mode: zone.mode,
        fallback_distance_km: zone.fallback_distance_km,
        danger_level: feature
            .danger_level
            .and_then(|level| u8::try_from(level).ok())
            .filter(|level| *level <= 5),
        danger_label: feature.danger.clone(),
        travel_advice: feature.travel_advice.clone(),
        link: feature.link.clone(),
        published_at: feature.start_date,
        expires_at: feature.end_date,
    }
}
