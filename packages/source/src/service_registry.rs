//! Compile-time registry of upstream service configurations.
//!
//! Each provider endpoint is defined in a TOML file under `services/`.
//! The registry embeds these at compile time and exposes them via
//! [`all_services`], [`enabled_services`], and [`service_for`].

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// What a service is used for. Each role is served by exactly one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    /// Primary hourly weather forecast.
    PrimaryWeather,
    /// Fallback hourly weather forecast used to fill gaps.
    SecondaryWeather,
    /// Live precipitation forecast + recent history.
    PrecipitationLive,
    /// Historical precipitation archive.
    PrecipitationArchive,
    /// Active official alerts.
    Alerts,
    /// Air quality.
    AirQuality,
    /// Avalanche forecast zone map layer.
    AvalancheZones,
    /// Snowpack station network.
    Snowpack,
}

/// An upstream service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Unique identifier (e.g., `"nws_forecast"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// What the service is used for.
    pub role: ServiceRole,
    /// Whether the pipeline calls this service.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Base URLs, tried in order. More than one means mirrored hosts.
    pub base_urls: Vec<String>,
    /// Per-call timeout override in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Attempts per host override.
    pub attempts: Option<u32>,
}

const fn default_true() -> bool {
    true
}

impl ServiceConfig {
    /// The first configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_urls.first().map_or("", String::as_str)
    }

    /// The per-call timeout, or `default` when not overridden.
    #[must_use]
    pub fn timeout(&self, default: Duration) -> Duration {
        self.timeout_ms.map_or(default, Duration::from_millis)
    }

    /// Retry bounds for this service, starting from `default`.
    #[must_use]
    pub fn retry_policy(&self, default: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts.unwrap_or(default.attempts),
            ..default
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("nws_forecast", include_str!("../services/nws_forecast.toml")),
    (
        "open_meteo_forecast",
        include_str!("../services/open_meteo_forecast.toml"),
    ),
    (
        "open_meteo_precipitation",
        include_str!("../services/open_meteo_precipitation.toml"),
    ),
    (
        "open_meteo_archive",
        include_str!("../services/open_meteo_archive.toml"),
    ),
    ("nws_alerts", include_str!("../services/nws_alerts.toml")),
    (
        "open_meteo_air_quality",
        include_str!("../services/open_meteo_air_quality.toml"),
    ),
    (
        "avalanche_map_layer",
        include_str!("../services/avalanche_map_layer.toml"),
    ),
    ("awdb_snotel", include_str!("../services/awdb_snotel.toml")),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 8;

/// Returns all service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<ServiceConfig> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services.
#[must_use]
pub fn enabled_services() -> Vec<ServiceConfig> {
    all_services().into_iter().filter(|s| s.enabled).collect()
}

/// Returns the enabled service for `role`, if any.
#[must_use]
pub fn service_for(role: ServiceRole) -> Option<ServiceConfig> {
    enabled_services().into_iter().find(|s| s.role == role)
}
