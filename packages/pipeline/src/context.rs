//! Long-lived pipeline state: providers, caches and per-call timeouts.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use backcountry_precipitation::acquire::PrecipitationAcquirer;
use backcountry_precipitation::feed::{OpenMeteoPrecipitationFeed, PrecipitationFeed};
use backcountry_providers::air_quality::OpenMeteoAirQuality;
use backcountry_providers::alerts::NwsAlerts;
use backcountry_providers::nws::NwsHourlyForecast;
use backcountry_providers::open_meteo::OpenMeteoForecast;
use backcountry_providers::{AirQualityProvider, AlertsProvider, Endpoint, WeatherProvider};
use backcountry_snowpack::SnowpackAcquirer;
use backcountry_snowpack::awdb::{AwdbSnowpackFeed, SnowpackFeed};
use backcountry_source::build_client;
use backcountry_source::retry::RetryPolicy;
use backcountry_source::service_registry::{
    ServiceConfig, ServiceRole, all_services, service_for,
};
use backcountry_zones::cache::{HttpZoneLayerFetcher, ZoneLayerCache, ZoneLayerFetcher};
use backcountry_zones::registry::{ResolverConfig, resolver_config};
use chrono::Duration;

use crate::PipelineError;

/// Start-up settings for [`PipelineContext::from_registry`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Sent with every request; NWS rejects anonymous clients.
    pub user_agent: String,
    /// Per-call timeout for services without an override.
    pub default_timeout: StdDuration,
    /// How long a fetched zone map layer stays fresh.
    pub zone_ttl: Duration,
    /// How long a live precipitation payload stays fresh.
    pub precipitation_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("backcountry-risk/", env!("CARGO_PKG_VERSION")).to_string(),
            default_timeout: StdDuration::from_secs(8),
            zone_ttl: Duration::minutes(15),
            precipitation_ttl: Duration::minutes(30),
        }
    }
}

/// Outer deadlines for the calls the pipeline bounds directly.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub primary_weather: StdDuration,
    pub secondary_weather: StdDuration,
    pub alerts: StdDuration,
    pub air_quality: StdDuration,
    pub zones: StdDuration,
}

impl Timeouts {
    #[must_use]
    pub const fn uniform(timeout: StdDuration) -> Self {
        Self {
            primary_weather: timeout,
            secondary_weather: timeout,
            alerts: timeout,
            air_quality: timeout,
            zones: timeout,
        }
    }
}

/// Everything [`crate::assess`] needs, shared across requests.
pub struct PipelineContext {
    pub primary_weather: Arc<dyn WeatherProvider>,
    pub secondary_weather: Arc<dyn WeatherProvider>,
    pub alerts: Arc<dyn AlertsProvider>,
    pub air_quality: Arc<dyn AirQualityProvider>,
    pub zone_fetcher: Arc<dyn ZoneLayerFetcher>,
    pub precipitation_feed: Arc<dyn PrecipitationFeed>,
    pub snowpack_feed: Arc<dyn SnowpackFeed>,
    pub zone_cache: ZoneLayerCache,
    pub precipitation: PrecipitationAcquirer,
    pub snowpack: SnowpackAcquirer,
    pub resolver: ResolverConfig,
    pub timeouts: Timeouts,
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("primary_weather", &self.primary_weather.name())
            .field("secondary_weather", &self.secondary_weather.name())
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}

fn required(role: ServiceRole) -> Result<ServiceConfig, PipelineError> {
    match service_for(role) {
        Some(service) if service.enabled => Ok(service),
        _ => Err(PipelineError::Configuration {
            message: format!("no enabled service configured for {role:?}"),
        }),
    }
}

impl PipelineContext {
    /// Builds the HTTP providers from the embedded service registry.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Configuration`] if a required service is
    /// missing or disabled, or [`PipelineError::Client`] if the HTTP client
    /// cannot be built.
    pub fn from_registry(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let ceiling = all_services()
            .iter()
            .map(|s| s.timeout(config.default_timeout))
            .max()
            .unwrap_or(config.default_timeout);
        let client = build_client(&config.user_agent, ceiling)?;
        let default_policy = RetryPolicy::default();

        let endpoint = |service: &ServiceConfig| {
            Endpoint::new(
                client.clone(),
                service.base_url(),
                service.retry_policy(default_policy),
            )
        };

        let nws = required(ServiceRole::PrimaryWeather)?;
        let open_meteo = required(ServiceRole::SecondaryWeather)?;
        let alerts = required(ServiceRole::Alerts)?;
        let air_quality = required(ServiceRole::AirQuality)?;
        let zones = required(ServiceRole::AvalancheZones)?;
        let live = required(ServiceRole::PrecipitationLive)?;
        let archive = required(ServiceRole::PrecipitationArchive)?;
        let snowpack = required(ServiceRole::Snowpack)?;

        let timeouts = Timeouts {
            primary_weather: nws.timeout(config.default_timeout),
            secondary_weather: open_meteo.timeout(config.default_timeout),
            alerts: alerts.timeout(config.default_timeout),
            air_quality: air_quality.timeout(config.default_timeout),
            zones: zones.timeout(config.default_timeout),
        };

        let precipitation_timeout = live
            .timeout(config.default_timeout)
            .max(archive.timeout(config.default_timeout));

        log::info!(
            "Pipeline configured: weather {} + {}, zone TTL {}s, precipitation TTL {}s",
            nws.id,
            open_meteo.id,
            config.zone_ttl.num_seconds(),
            config.precipitation_ttl.num_seconds()
        );

        Ok(Self {
            primary_weather: Arc::new(NwsHourlyForecast::new(endpoint(&nws))),
            secondary_weather: Arc::new(OpenMeteoForecast::new(endpoint(&open_meteo))),
            alerts: Arc::new(NwsAlerts::new(endpoint(&alerts))),
            air_quality: Arc::new(OpenMeteoAirQuality::new(endpoint(&air_quality))),
            zone_fetcher: Arc::new(HttpZoneLayerFetcher::new(
                client.clone(),
                zones.base_url().to_string(),
                zones.retry_policy(default_policy),
                timeouts.zones,
            )),
            precipitation_feed: Arc::new(OpenMeteoPrecipitationFeed::new(
                client.clone(),
                live.base_urls.clone(),
                live.retry_policy(default_policy),
                archive.base_url().to_string(),
                archive.retry_policy(default_policy),
            )),
            snowpack_feed: Arc::new(AwdbSnowpackFeed::new(
                client,
                snowpack.base_url().to_string(),
                snowpack.retry_policy(default_policy),
            )),
            zone_cache: ZoneLayerCache::new(config.zone_ttl),
            precipitation: PrecipitationAcquirer::new(
                config.precipitation_ttl,
                precipitation_timeout,
            ),
            snowpack: SnowpackAcquirer::new(snowpack.timeout(config.default_timeout)),
            resolver: resolver_config(),
            timeouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_from_embedded_registry() {
        let context = PipelineContext::from_registry(&PipelineConfig::default()).unwrap();
        assert_eq!(context.primary_weather.name(), "nws");
        assert_eq!(context.secondary_weather.name(), "open-meteo");
        assert_eq!(context.timeouts.primary_weather, StdDuration::from_millis(8000));
        assert_eq!(context.timeouts.zones, StdDuration::from_millis(10_000));
        assert_eq!(context.timeouts.alerts, StdDuration::from_secs(8));
    }
}
