#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-request orchestration.
//!
//! [`assess`] validates the request, fans out to every signal producer
//! concurrently, fuses the two weather records, derives fire risk and
//! composes the safety score into a [`SafetyReport`]. A failed producer
//! degrades to an `unavailable` record; only invalid input and an unusable
//! zone layer abort the request.

pub mod context;

use backcountry_fusion::fuse_weather;
use backcountry_precipitation::acquire::PrecipitationRequest;
use backcountry_providers::fire::assess_fire_risk;
use backcountry_providers::{ProviderError, WeatherProvider};
use backcountry_score::{SafetySignals, compose_safety_score};
use backcountry_signal_models::{
    AirQualitySignal, AlertsSignal, AvalancheSignal, Coordinate, InvalidCoordinateError,
    SafetyReport, WeatherRecord,
};
use backcountry_source::SourceError;
use backcountry_source::deadline::{CancelSignal, with_deadline};
use backcountry_zones::ZoneError;
use backcountry_zones::avalanche::avalanche_signal;
use backcountry_zones::resolve_zone_with;
use chrono::{DateTime, Utc};

pub use context::{PipelineConfig, PipelineContext, Timeouts};

pub const DEFAULT_TRAVEL_HOURS: u32 = 6;
pub const MIN_TRAVEL_HOURS: u32 = 1;
pub const MAX_TRAVEL_HOURS: u32 = 24;

/// Errors that abort an assessment or prevent the pipeline from starting.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidCoordinate(#[from] InvalidCoordinateError),

    #[error("Travel window must be between 1 and 24 hours, got {0}")]
    InvalidTravelWindow(u32),

    /// The zone layer is malformed and nothing is cached.
    #[error("Avalanche zone layer unusable: {0}")]
    ZoneLayer(#[source] ZoneError),

    #[error("Pipeline configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Client(#[from] SourceError),
}

impl PipelineError {
    /// Whether the caller sent bad input.
    #[must_use]
    pub const fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate(_) | Self::InvalidTravelWindow(_)
        )
    }
}

/// One assessment request as received from a caller.
#[derive(Debug, Clone, Copy)]
pub struct AssessmentRequest {
    pub lat: f64,
    pub lon: f64,
    /// Selected start; defaults to now.
    pub start: Option<DateTime<Utc>>,
    /// Travel window in hours; defaults to [`DEFAULT_TRAVEL_HOURS`].
    pub travel_hours: Option<u32>,
}

/// Runs an assessment against the wall clock.
///
/// # Errors
///
/// See [`assess_at`].
pub async fn assess(
    request: AssessmentRequest,
    context: &PipelineContext,
    cancel: Option<&CancelSignal>,
) -> Result<SafetyReport, PipelineError> {
    assess_at(request, context, cancel, Utc::now()).await
}

/// Runs an assessment with `now` as the reference time.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidCoordinate`] or
/// [`PipelineError::InvalidTravelWindow`] for bad input, and
/// [`PipelineError::ZoneLayer`] when the zone payload is malformed and no
/// earlier layer is cached.
pub async fn assess_at(
    request: AssessmentRequest,
    context: &PipelineContext,
    cancel: Option<&CancelSignal>,
    now: DateTime<Utc>,
) -> Result<SafetyReport, PipelineError> {
    let coordinate = Coordinate::new(request.lat, request.lon)?;
    let travel_hours = request.travel_hours.unwrap_or(DEFAULT_TRAVEL_HOURS);
    if !(MIN_TRAVEL_HOURS..=MAX_TRAVEL_HOURS).contains(&travel_hours) {
        return Err(PipelineError::InvalidTravelWindow(travel_hours));
    }
    let start = request.start.unwrap_or(now);
    let timeouts = context.timeouts;

    log::info!("Assessing {coordinate} from {start} for {travel_hours}h");

    let zones = context.zone_cache.get_or_refresh(
        context.zone_fetcher.as_ref(),
        now,
        timeouts.zones,
        cancel,
    );
    let primary = with_deadline(
        context
            .primary_weather
            .fetch_weather(&coordinate, start, travel_hours),
        timeouts.primary_weather,
        cancel,
    );
    let secondary = with_deadline(
        context
            .secondary_weather
            .fetch_weather(&coordinate, start, travel_hours),
        timeouts.secondary_weather,
        cancel,
    );
    let alerts = with_deadline(
        context.alerts.fetch_alerts(&coordinate),
        timeouts.alerts,
        cancel,
    );
    let air_quality = with_deadline(
        context.air_quality.fetch_air_quality(&coordinate, start),
        timeouts.air_quality,
        cancel,
    );
    let precipitation = context.precipitation.acquire(
        context.precipitation_feed.as_ref(),
        PrecipitationRequest {
            coordinate: &coordinate,
            anchor: start,
            window_hours: travel_hours,
            now,
        },
        cancel,
    );
    let snowpack_date = start.min(now).date_naive();
    let snowpack = context.snowpack.acquire(
        context.snowpack_feed.as_ref(),
        &coordinate,
        snowpack_date,
        now,
        cancel,
    );

    let (zones, primary, secondary, alerts, air_quality, precipitation, snowpack) = tokio::join!(
        zones,
        primary,
        secondary,
        alerts,
        air_quality,
        precipitation,
        snowpack
    );

    let avalanche = match zones {
        Ok(layer) => {
            let zone = resolve_zone_with(&coordinate, &layer.payload, &context.resolver);
            avalanche_signal(&zone, start)
        }
        Err(e) if e.is_fatal() => return Err(PipelineError::ZoneLayer(e)),
        Err(e) => {
            log::warn!("Avalanche zone layer unavailable for {coordinate}: {e}");
            AvalancheSignal::unavailable()
        }
    };

    let weather = merge_weather(
        weather_or_unavailable(primary, context.primary_weather.as_ref()),
        weather_or_unavailable(secondary, context.secondary_weather.as_ref()),
    );

    let alerts = alerts.unwrap_or_else(|e| {
        log::warn!("Alerts unavailable for {coordinate}: {e}");
        AlertsSignal::default()
    });
    let air_quality = air_quality.unwrap_or_else(|e| {
        log::warn!("Air quality unavailable for {coordinate}: {e}");
        AirQualitySignal::default()
    });
    let fire = assess_fire_risk(&weather, &alerts, start);

    let safety = compose_safety_score(&SafetySignals {
        now,
        selected_start: start,
        travel_window_hours: travel_hours,
        weather: &weather,
        avalanche: &avalanche,
        precipitation: &precipitation,
        snowpack: &snowpack,
        alerts: &alerts,
        air_quality: &air_quality,
        fire: &fire,
    });

    Ok(SafetyReport {
        coordinate,
        selected_start: start,
        travel_window_hours: travel_hours,
        generated_at: now,
        weather,
        avalanche,
        precipitation,
        snowpack,
        alerts,
        air_quality,
        fire,
        safety,
    })
}

fn weather_or_unavailable(
    result: Result<WeatherRecord, ProviderError>,
    provider: &dyn WeatherProvider,
) -> WeatherRecord {
    result.unwrap_or_else(|e| {
        log::warn!("Weather provider {} failed: {e}", provider.name());
        WeatherRecord::unavailable(provider.name())
    })
}

/// Fuses the two records, promoting the secondary to the primary role when
/// the primary has nothing usable for the selected start.
#[must_use]
pub fn merge_weather(primary: WeatherRecord, secondary: WeatherRecord) -> WeatherRecord {
    if !primary.status.has_data() && secondary.status.has_data() {
        log::warn!(
            "Primary weather {} is {}; promoting {}",
            primary.source,
            primary.status,
            secondary.source
        );
        return fuse_weather(&secondary, &primary);
    }
    fuse_weather(&primary, &secondary)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use backcountry_precipitation::acquire::PrecipitationAcquirer;
    use backcountry_precipitation::feed::PrecipitationFeed;
    use backcountry_precipitation::{HourlySeries, PrecipitationError, PrecipitationPayload};
    use backcountry_providers::{AirQualityProvider, AlertsProvider};
    use backcountry_signal_models::{
        PrecipitationSource, SignalStatus, WeatherPoint, ZoneMatchMode,
    };
    use backcountry_snowpack::awdb::{SnotelStation, SnowpackFeed};
    use backcountry_snowpack::{SnowpackAcquirer, SnowpackError, StationObservation};
    use backcountry_source::deadline::cancel_pair;
    use backcountry_zones::ForecastZoneFeature;
    use backcountry_zones::cache::{ZoneLayerCache, ZoneLayerFetcher};
    use backcountry_zones::registry::resolver_config;
    use chrono::{Duration, NaiveDate, TimeZone as _};
    use geo::{LineString, MultiPolygon, Polygon};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 15, 0, 0).unwrap()
    }

    struct FixedWeather {
        name: &'static str,
        record: Option<WeatherRecord>,
    }

    #[async_trait]
    impl WeatherProvider for FixedWeather {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch_weather(
            &self,
            _coord: &Coordinate,
            _start: DateTime<Utc>,
            _window_hours: u32,
        ) -> Result<WeatherRecord, ProviderError> {
            self.record.clone().ok_or(ProviderError::Normalization {
                message: "offline".to_string(),
            })
        }
    }

    struct NoAlerts;

    #[async_trait]
    impl AlertsProvider for NoAlerts {
        async fn fetch_alerts(&self, _coord: &Coordinate) -> Result<AlertsSignal, ProviderError> {
            Ok(AlertsSignal {
                status: SignalStatus::Ok,
                alerts: vec![],
            })
        }
    }

    struct Smoky(u32);

    #[async_trait]
    impl AirQualityProvider for Smoky {
        async fn fetch_air_quality(
            &self,
            _coord: &Coordinate,
            at: DateTime<Utc>,
        ) -> Result<AirQualitySignal, ProviderError> {
            Ok(AirQualitySignal {
                status: SignalStatus::Ok,
                us_aqi: Some(self.0),
                pm2_5: Some(60.0),
                category: None,
                observed_at: Some(at),
            })
        }
    }

    enum Layer {
        Zones(Vec<ForecastZoneFeature>),
        Malformed,
        /// Serves the zones once, then hangs past any deadline.
        StallsAfterFirst(Vec<ForecastZoneFeature>, AtomicUsize),
    }

    struct FakeZones(Layer);

    #[async_trait]
    impl ZoneLayerFetcher for FakeZones {
        async fn fetch_layer(&self) -> Result<Vec<ForecastZoneFeature>, ZoneError> {
            match &self.0 {
                Layer::Zones(zones) => Ok(zones.clone()),
                Layer::Malformed => Err(ZoneError::MalformedPayload {
                    message: "no features array".to_string(),
                }),
                Layer::StallsAfterFirst(zones, calls) => {
                    if calls.fetch_add(1, Ordering::SeqCst) > 0 {
                        tokio::time::sleep(StdDuration::from_secs(5)).await;
                    }
                    Ok(zones.clone())
                }
            }
        }
    }

    struct DryPrecipitation;

    #[async_trait]
    impl PrecipitationFeed for DryPrecipitation {
        async fn fetch_live(
            &self,
            _coord: &Coordinate,
        ) -> Result<PrecipitationPayload, PrecipitationError> {
            let times: Vec<DateTime<Utc>> =
                (-72..72).map(|h| now() + Duration::hours(h)).collect();
            let values = vec![Some(0.0); times.len()];
            let series = HourlySeries::new(times, values)?;
            Ok(PrecipitationPayload {
                rain: series.clone(),
                snow: series,
            })
        }

        async fn fetch_archive(
            &self,
            _coord: &Coordinate,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PrecipitationPayload, PrecipitationError> {
            Err(PrecipitationError::MissingField { field: "hourly" })
        }
    }

    struct NoStations;

    #[async_trait]
    impl SnowpackFeed for NoStations {
        async fn fetch_stations(&self) -> Result<Vec<SnotelStation>, SnowpackError> {
            Ok(vec![])
        }

        async fn fetch_daily_swe(
            &self,
            _station_triplet: &str,
            _begin: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<StationObservation>, SnowpackError> {
            Ok(vec![])
        }
    }

    fn summit_zone() -> ForecastZoneFeature {
        let ring = LineString::from(vec![
            (-106.2, 39.4),
            (-105.8, 39.4),
            (-105.8, 39.7),
            (-106.2, 39.7),
            (-106.2, 39.4),
        ]);
        ForecastZoneFeature {
            zone_id: Some("2".to_string()),
            center_id: "CAIC".to_string(),
            name: "Vail & Summit County".to_string(),
            state: Some("CO".to_string()),
            danger_level: Some(4),
            danger: Some("high".to_string()),
            travel_advice: None,
            link: None,
            off_season: false,
            start_date: Some(now() - Duration::hours(2)),
            end_date: Some(now() + Duration::hours(22)),
            geometry: MultiPolygon::new(vec![Polygon::new(ring, vec![])]),
        }
    }

    fn hour(offset: i64, gust: f64) -> WeatherPoint {
        WeatherPoint {
            time: Some(now() + Duration::hours(offset)),
            temperature_f: Some(30.0),
            wind_speed_mph: Some(5.0),
            wind_gust_mph: Some(gust),
            humidity_pct: Some(60.0),
            is_daytime: Some(true),
            ..WeatherPoint::default()
        }
    }

    fn forecast(source: &str) -> WeatherRecord {
        WeatherRecord {
            status: SignalStatus::Ok,
            source: source.to_string(),
            issued_at: Some(now()),
            current: hour(0, 5.0),
            trend: (1..=6)
                .map(|h| hour(h, if h == 3 { 50.0 } else { 5.0 }))
                .collect(),
            ..WeatherRecord::default()
        }
    }

    fn context(primary: Option<WeatherRecord>, layer: Layer) -> PipelineContext {
        PipelineContext {
            primary_weather: Arc::new(FixedWeather {
                name: "nws",
                record: primary,
            }),
            secondary_weather: Arc::new(FixedWeather {
                name: "open-meteo",
                record: Some(forecast("open-meteo")),
            }),
            alerts: Arc::new(NoAlerts),
            air_quality: Arc::new(Smoky(160)),
            zone_fetcher: Arc::new(FakeZones(layer)),
            precipitation_feed: Arc::new(DryPrecipitation),
            snowpack_feed: Arc::new(NoStations),
            zone_cache: ZoneLayerCache::new(Duration::minutes(15)),
            precipitation: PrecipitationAcquirer::new(
                Duration::minutes(30),
                StdDuration::from_secs(1),
            ),
            snowpack: SnowpackAcquirer::new(StdDuration::from_secs(1)),
            resolver: resolver_config(),
            timeouts: Timeouts::uniform(StdDuration::from_secs(1)),
        }
    }

    fn request() -> AssessmentRequest {
        AssessmentRequest {
            lat: 39.55,
            lon: -106.0,
            start: None,
            travel_hours: None,
        }
    }

    #[tokio::test]
    async fn assembles_report_from_every_producer() {
        let ctx = context(Some(forecast("nws")), Layer::Zones(vec![summit_zone()]));
        let report = assess_at(request(), &ctx, None, now()).await.unwrap();

        assert_eq!(report.selected_start, now());
        assert_eq!(report.travel_window_hours, DEFAULT_TRAVEL_HOURS);
        assert_eq!(report.avalanche.status, SignalStatus::Ok);
        assert_eq!(report.avalanche.match_mode, ZoneMatchMode::Polygon);
        assert_eq!(report.avalanche.danger_level, Some(4));
        assert_eq!(report.weather.source, "nws");
        assert_eq!(report.precipitation.source, PrecipitationSource::Live);
        assert_eq!(report.snowpack.status, SignalStatus::NoData);
        assert_eq!(report.fire.status, SignalStatus::Ok);

        assert_eq!(report.safety.score, 14);
        assert_eq!(report.safety.primary_hazard, "Avalanche");
        assert_eq!(report.safety.confidence, 100);
    }

    #[tokio::test]
    async fn secondary_promoted_when_primary_fails() {
        let ctx = context(None, Layer::Zones(vec![summit_zone()]));
        let report = assess_at(request(), &ctx, None, now()).await.unwrap();
        assert_eq!(report.weather.source, "open-meteo");
        assert_eq!(report.weather.status, SignalStatus::Ok);
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let ctx = context(Some(forecast("nws")), Layer::Zones(vec![]));

        let bad_lat = AssessmentRequest {
            lat: 91.0,
            ..request()
        };
        let err = assess_at(bad_lat, &ctx, None, now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCoordinate(_)));
        assert!(err.is_invalid_request());

        for hours in [0, 25] {
            let bad_window = AssessmentRequest {
                travel_hours: Some(hours),
                ..request()
            };
            let err = assess_at(bad_window, &ctx, None, now()).await.unwrap_err();
            assert!(matches!(err, PipelineError::InvalidTravelWindow(h) if h == hours));
        }
    }

    #[tokio::test]
    async fn malformed_zone_layer_is_fatal() {
        let ctx = context(Some(forecast("nws")), Layer::Malformed);
        let err = assess_at(request(), &ctx, None, now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ZoneLayer(_)));
        assert!(!err.is_invalid_request());
    }

    #[tokio::test]
    async fn slow_zone_refresh_serves_cached_layer() {
        let ctx = context(
            Some(forecast("nws")),
            Layer::StallsAfterFirst(vec![summit_zone()], AtomicUsize::new(0)),
        );
        let first = assess_at(request(), &ctx, None, now()).await.unwrap();
        assert_eq!(first.avalanche.status, SignalStatus::Ok);

        let later = now() + Duration::hours(1);
        let second = assess_at(request(), &ctx, None, later).await.unwrap();
        assert_eq!(second.avalanche.status, SignalStatus::Ok);
        assert_eq!(second.avalanche.danger_level, Some(4));
    }

    #[tokio::test]
    async fn cancelled_request_degrades_every_feed() {
        let ctx = context(Some(forecast("nws")), Layer::Zones(vec![summit_zone()]));
        let (handle, signal) = cancel_pair();
        handle.cancel();

        let report = assess_at(request(), &ctx, Some(&signal), now())
            .await
            .unwrap();

        assert_eq!(report.weather.status, SignalStatus::Unavailable);
        assert_eq!(report.avalanche.status, SignalStatus::Unavailable);
        assert_eq!(report.alerts.status, SignalStatus::Unavailable);
        assert_eq!(report.air_quality.status, SignalStatus::Unavailable);
        assert!(report.precipitation.fallback_mode);
        assert_eq!(report.snowpack.status, SignalStatus::Unavailable);
        assert_eq!(report.fire.status, SignalStatus::Unavailable);
        assert_eq!(report.safety.confidence, 20);
    }
}
