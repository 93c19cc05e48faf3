#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Snowpack signal: nearest SNOTEL station and its SWE against the
//! same-day-of-year average of prior seasons.

pub mod awdb;
pub mod baseline;

use std::time::Duration as StdDuration;

use backcountry_signal_models::{Coordinate, HistoricalStatus, SignalStatus, SnowpackSignal};
use backcountry_source::SourceError;
use backcountry_source::cache::SnapshotCache;
use backcountry_source::deadline::{CancelSignal, with_deadline};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use geo::{Distance, Haversine, Point};

use crate::awdb::{SnotelStation, SnowpackFeed};

pub use baseline::{
    BaselineOptions, StationObservation, compare_to_historical_baseline, compare_with_options,
};

/// Stations further than this are not considered representative.
pub const MAX_STATION_DISTANCE_KM: f64 = 50.0;
/// Years of daily history fetched: ten baseline seasons plus the current.
pub const HISTORY_YEARS: i32 = 11;

/// Errors from snowpack feeds.
#[derive(Debug, thiserror::Error)]
pub enum SnowpackError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Unexpected snowpack payload: {message}")]
    UnexpectedShape { message: String },
}

/// Station list cache plus the per-request lookup.
#[derive(Debug)]
pub struct SnowpackAcquirer {
    stations: SnapshotCache<(), Vec<SnotelStation>>,
    call_timeout: StdDuration,
}

impl SnowpackAcquirer {
    /// Station lists are cached for a day.
    #[must_use]
    pub const fn new(call_timeout: StdDuration) -> Self {
        Self {
            stations: SnapshotCache::new(Duration::hours(24)),
            call_timeout,
        }
    }

    /// Builds the snowpack signal for `coord` on `target`.
    ///
    /// No station within range yields `no_data`; any fetch failure yields
    /// `unavailable`.
    pub async fn acquire(
        &self,
        feed: &dyn SnowpackFeed,
        coord: &Coordinate,
        target: NaiveDate,
        now: DateTime<Utc>,
        cancel: Option<&CancelSignal>,
    ) -> SnowpackSignal {
        let stations = match self.stations.fresh(&(), now) {
            Some(snapshot) => snapshot,
            None => match with_deadline(feed.fetch_stations(), self.call_timeout, cancel).await {
                Ok(list) => self.stations.replace((), list, now),
                Err(e) => match self.stations.any(&()) {
                    Some(stale) => {
                        log::warn!("SNOTEL station refresh failed, using list from {}: {e}", stale.fetched_at);
                        stale
                    }
                    None => {
                        log::warn!("SNOTEL station list unavailable: {e}");
                        return unavailable();
                    }
                },
            },
        };

        let Some((station, distance_km)) = nearest_station(coord, &stations.payload) else {
            log::debug!("No SNOTEL station within {MAX_STATION_DISTANCE_KM} km of {coord}");
            return SnowpackSignal {
                status: SignalStatus::NoData,
                ..SnowpackSignal::default()
            };
        };

        let begin = NaiveDate::from_ymd_opt(target.year() - HISTORY_YEARS, 1, 1).unwrap_or(target);
        let history = match with_deadline(
            feed.fetch_daily_swe(&station.station_triplet, begin, target),
            self.call_timeout,
            cancel,
        )
        .await
        {
            Ok(history) => history,
            Err(e) => {
                log::warn!("SWE history for {} failed: {e}", station.station_triplet);
                return unavailable();
            }
        };

        snowpack_signal(station, distance_km, &history, target)
    }
}

/// Builds a signal from a station's daily history.
#[must_use]
pub fn snowpack_signal(
    station: &SnotelStation,
    distance_km: f64,
    history: &[StationObservation],
    target: NaiveDate,
) -> SnowpackSignal {
    let comparison = compare_to_historical_baseline(history, target);
    let latest = history.iter().filter(|o| o.date <= target).max_by_key(|o| o.date);

    let status = match (latest, comparison.status) {
        (None, _) => SignalStatus::NoData,
        (Some(_), HistoricalStatus::Unknown) => SignalStatus::Partial,
        (Some(_), _) => SignalStatus::Ok,
    };

    SnowpackSignal {
        status,
        station_id: Some(station.station_triplet.clone()),
        station_name: Some(station.name.clone()),
        distance_km: Some(distance_km),
        observed_on: latest.map(|o| o.date),
        snow_water_equivalent_in: comparison.current_value,
        summary: comparison.summary(),
        comparison: Some(comparison),
    }
}

/// Nearest station within [`MAX_STATION_DISTANCE_KM`]; the first one wins
/// on ties.
#[must_use]
pub fn nearest_station<'a>(
    coord: &Coordinate,
    stations: &'a [SnotelStation],
) -> Option<(&'a SnotelStation, f64)> {
    let here = Point::new(coord.lon, coord.lat);
    stations
        .iter()
        .map(|s| {
            let km = Haversine.distance(here, Point::new(s.longitude, s.latitude)) / 1000.0;
            (s, km)
        })
        .filter(|(_, km)| *km <= MAX_STATION_DISTANCE_KM)
        .fold(None, |best: Option<(&SnotelStation, f64)>, candidate| match best {
            Some(b) if b.1 <= candidate.1 => Some(b),
            _ => Some(candidate),
        })
}

fn unavailable() -> SnowpackSignal {
    SnowpackSignal {
        status: SignalStatus::Unavailable,
        ..SnowpackSignal::default()
    }
}
