//! Tiered precipitation acquisition.
//!
//! Tiers are tried in a fixed order and the chain always terminates with a
//! signal:
//!
//! 1. live feed (mirrored hosts, bounded retries inside the feed);
//! 2. fresh cached payload for the rounded coordinate;
//! 3. archive for the trailing days, skipped for anchors well in the future;
//! 4. cached payload of any age;
//! 5. zero-valued fallback tagged with `fallback_mode`.

use std::time::Duration as StdDuration;

use backcountry_signal_models::{
    Coordinate, PrecipitationSignal, PrecipitationSource, SignalStatus,
};
use backcountry_source::cache::SnapshotCache;
use backcountry_source::deadline::{CancelSignal, with_deadline};
use chrono::{DateTime, Duration, Utc};

use crate::feed::PrecipitationFeed;
use crate::summary::{PrecipitationPayload, fallback_signal, summarize_precipitation};

/// Anchors further than this past now skip the archive tier.
const ARCHIVE_MAX_LEAD: Duration = Duration::hours(1);
/// Days of archive history requested before the anchor.
const ARCHIVE_TRAILING_DAYS: i64 = 3;

/// One acquisition request.
#[derive(Debug, Clone, Copy)]
pub struct PrecipitationRequest<'a> {
    pub coordinate: &'a Coordinate,
    /// Look-back windows end here; the look-ahead starts here.
    pub anchor: DateTime<Utc>,
    /// Look-ahead length in hours.
    pub window_hours: u32,
    pub now: DateTime<Utc>,
}

/// Owns the payload cache and runs the tier chain.
#[derive(Debug)]
pub struct PrecipitationAcquirer {
    cache: SnapshotCache<String, PrecipitationPayload>,
    call_timeout: StdDuration,
}

impl PrecipitationAcquirer {
    /// Creates an acquirer whose cache entries are fresh for `ttl` and whose
    /// feed calls are bounded by `call_timeout`.
    #[must_use]
    pub const fn new(ttl: Duration, call_timeout: StdDuration) -> Self {
        Self {
            cache: SnapshotCache::new(ttl),
            call_timeout,
        }
    }

    /// Runs the chain for `request`. Never fails; degradation is carried by
    /// the signal's `source`, `status` and `fallback_mode`.
    pub async fn acquire(
        &self,
        feed: &dyn PrecipitationFeed,
        request: PrecipitationRequest<'_>,
        cancel: Option<&CancelSignal>,
    ) -> PrecipitationSignal {
        let PrecipitationRequest {
            coordinate,
            anchor,
            window_hours,
            now,
        } = request;
        let key = coordinate.cache_key();

        match with_deadline(feed.fetch_live(coordinate), self.call_timeout, cancel).await {
            Ok(payload) => {
                log::debug!("Live precipitation for {key}");
                let snapshot = self.cache.replace(key, payload, now);
                return summarize_precipitation(
                    &snapshot.payload,
                    anchor,
                    window_hours,
                    PrecipitationSource::Live,
                    Some(snapshot.fetched_at),
                );
            }
            Err(e) => log::warn!("Live precipitation failed for {key}: {e}"),
        }

        if let Some(snapshot) = self.cache.fresh(&key, now) {
            log::warn!("Serving cached precipitation for {key} from {}", snapshot.fetched_at);
            return summarize_precipitation(
                &snapshot.payload,
                anchor,
                window_hours,
                PrecipitationSource::Cache,
                Some(snapshot.fetched_at),
            );
        }

        if anchor > now + ARCHIVE_MAX_LEAD {
            log::debug!("Skipping precipitation archive for future anchor {anchor}");
        } else {
            let end = anchor.date_naive();
            let start = (anchor - Duration::days(ARCHIVE_TRAILING_DAYS)).date_naive();
            match with_deadline(
                feed.fetch_archive(coordinate, start, end),
                self.call_timeout,
                cancel,
            )
            .await
            {
                Ok(payload) => {
                    log::warn!("Serving archived precipitation for {key}");
                    return summarize_precipitation(
                        &payload,
                        anchor,
                        window_hours,
                        PrecipitationSource::Archive,
                        Some(now),
                    );
                }
                Err(e) => log::warn!("Precipitation archive failed for {key}: {e}"),
            }
        }

        if let Some(snapshot) = self.cache.any(&key) {
            log::warn!(
                "Serving stale precipitation for {key} from {}",
                snapshot.fetched_at
            );
            let mut signal = summarize_precipitation(
                &snapshot.payload,
                anchor,
                window_hours,
                PrecipitationSource::StaleCache,
                Some(snapshot.fetched_at),
            );
            if signal.status == SignalStatus::Ok {
                signal.status = SignalStatus::Partial;
            }
            return signal;
        }

        log::warn!("Every precipitation tier failed for {key}, using zero fallback");
        fallback_signal(anchor, window_hours)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use backcountry_source::SourceError;
    use backcountry_source::deadline::cancel_pair;
    use chrono::{NaiveDate, TimeZone as _};

    use super::*;
    use crate::PrecipitationError;
    use crate::series::HourlySeries;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()
    }

    fn coord() -> Coordinate {
        Coordinate::new(39.6403, -106.3742).unwrap()
    }

    fn payload(snow_per_hour: f64) -> PrecipitationPayload {
        let time: Vec<_> = (-48..24).map(|h| now() + Duration::hours(h)).collect();
        let values = vec![Some(snow_per_hour); time.len()];
        PrecipitationPayload {
            rain: HourlySeries::new(time.clone(), vec![Some(0.0); time.len()]).unwrap(),
            snow: HourlySeries::new(time, values).unwrap(),
        }
    }

    fn down() -> PrecipitationError {
        PrecipitationError::Source(SourceError::Status {
            status: 503,
            url: "https://example.invalid".to_string(),
        })
    }

    /// Feed whose live and archive answers are fixed per test.
    struct FakeFeed {
        live: Option<f64>,
        archive: Option<f64>,
        live_calls: AtomicUsize,
        archive_calls: AtomicUsize,
    }

    impl FakeFeed {
        const fn new(live: Option<f64>, archive: Option<f64>) -> Self {
            Self {
                live,
                archive,
                live_calls: AtomicUsize::new(0),
                archive_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PrecipitationFeed for FakeFeed {
        async fn fetch_live(&self, _: &Coordinate) -> Result<PrecipitationPayload, PrecipitationError> {
            self.live_calls.fetch_add(1, Ordering::SeqCst);
            self.live.map(payload).ok_or_else(down)
        }

        async fn fetch_archive(
            &self,
            _: &Coordinate,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PrecipitationPayload, PrecipitationError> {
            assert!(start < end);
            self.archive_calls.fetch_add(1, Ordering::SeqCst);
            self.archive.map(payload).ok_or_else(down)
        }
    }

    fn request(coord: &Coordinate, anchor: DateTime<Utc>, at: DateTime<Utc>) -> PrecipitationRequest<'_> {
        PrecipitationRequest {
            coordinate: coord,
            anchor,
            window_hours: 6,
            now: at,
        }
    }

    fn acquirer() -> PrecipitationAcquirer {
        PrecipitationAcquirer::new(Duration::minutes(30), StdDuration::from_secs(5))
    }

    #[tokio::test]
    async fn live_tier_fills_cache() {
        let acq = acquirer();
        let c = coord();
        let signal = acq
            .acquire(&FakeFeed::new(Some(0.5), None), request(&c, now(), now()), None)
            .await;
        assert_eq!(signal.source, PrecipitationSource::Live);
        assert_eq!(signal.status, SignalStatus::Ok);
        assert_eq!(signal.snow.past_24h.total, Some(12.0));
        assert_eq!(signal.fetched_at, Some(now()));
    }

    #[tokio::test]
    async fn fresh_cache_serves_when_live_fails() {
        let acq = acquirer();
        let c = coord();
        acq.acquire(&FakeFeed::new(Some(0.5), None), request(&c, now(), now()), None)
            .await;

        let failing = FakeFeed::new(None, Some(0.1));
        let later = now() + Duration::minutes(10);
        let signal = acq.acquire(&failing, request(&c, now(), later), None).await;

        assert_eq!(signal.source, PrecipitationSource::Cache);
        assert_eq!(signal.fetched_at, Some(now()));
        assert_eq!(failing.archive_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn archive_used_after_cache_expires() {
        let acq = acquirer();
        let c = coord();
        acq.acquire(&FakeFeed::new(Some(0.5), None), request(&c, now(), now()), None)
            .await;

        let failing = FakeFeed::new(None, Some(0.1));
        let later = now() + Duration::hours(2);
        let signal = acq.acquire(&failing, request(&c, now(), later), None).await;

        assert_eq!(signal.source, PrecipitationSource::Archive);
        assert!(!signal.fallback_mode);
        assert_eq!(failing.archive_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn future_anchor_skips_archive_and_serves_stale_copy() {
        let acq = acquirer();
        let c = coord();
        acq.acquire(&FakeFeed::new(Some(0.5), None), request(&c, now(), now()), None)
            .await;

        let failing = FakeFeed::new(None, Some(0.1));
        let later = now() + Duration::hours(2);
        let anchor = later + Duration::hours(3);
        let signal = acq.acquire(&failing, request(&c, anchor, later), None).await;

        assert_eq!(failing.archive_calls.load(Ordering::SeqCst), 0);
        assert_eq!(signal.source, PrecipitationSource::StaleCache);
        assert_eq!(signal.status, SignalStatus::Partial);
        assert_eq!(signal.fetched_at, Some(now()));
    }

    #[tokio::test]
    async fn everything_down_yields_tagged_zero_fallback() {
        let acq = acquirer();
        let c = coord();
        let signal = acq
            .acquire(&FakeFeed::new(None, None), request(&c, now(), now()), None)
            .await;

        assert_eq!(signal.source, PrecipitationSource::Fallback);
        assert!(signal.fallback_mode);
        assert_eq!(signal.status, SignalStatus::Unavailable);
        assert_eq!(signal.rain.past_24h.total, Some(0.0));
    }

    #[tokio::test]
    async fn cancelled_request_skips_network_tiers() {
        let acq = acquirer();
        let c = coord();
        let feed = FakeFeed::new(Some(0.5), Some(0.5));
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let result = acq.acquire(&feed, request(&c, now(), now()), Some(&signal)).await;

        assert_eq!(feed.live_calls.load(Ordering::SeqCst), 0);
        assert_eq!(feed.archive_calls.load(Ordering::SeqCst), 0);
        assert!(result.fallback_mode);
    }

    #[tokio::test]
    async fn nearby_coordinates_share_a_cache_entry() {
        let acq = acquirer();
        let a = Coordinate::new(39.641, -106.374).unwrap();
        let b = Coordinate::new(39.6412, -106.3738).unwrap();
        acq.acquire(&FakeFeed::new(Some(0.5), None), request(&a, now(), now()), None)
            .await;

        let signal = acq
            .acquire(&FakeFeed::new(None, None), request(&b, now(), now()), None)
            .await;
        assert_eq!(signal.source, PrecipitationSource::Cache);
    }
}
