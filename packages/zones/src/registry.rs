//! Regional resolver overrides.
//!
//! Some forecast centers publish sparse polygons that leave large parts of
//! their territory uncovered. Each override lives in a TOML file under
//! `regions/` and widens the nearest-zone threshold for one center inside
//! a bounding box. The files are embedded at compile time.

use std::sync::LazyLock;

use backcountry_signal_models::Coordinate;
use serde::Deserialize;

/// Nearest-vertex threshold applied everywhere (km).
pub const DEFAULT_MAX_DISTANCE_KM: f64 = 40.0;

/// Latitude/longitude box, inclusive on all sides.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn contains(&self, coord: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&coord.lat)
            && (self.min_lon..=self.max_lon).contains(&coord.lon)
    }
}

/// A widened nearest-zone search for one forecast center.
#[derive(Debug, Clone, Deserialize)]
pub struct RegionalOverride {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Only zones from this center are candidates.
    pub center_id: String,
    /// Widened threshold (km).
    pub max_distance_km: f64,
    /// Area the override applies to.
    pub bounds: BoundingBox,
}

/// Thresholds used by [`crate::resolve_zone_with`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub default_max_distance_km: f64,
    /// Checked in order; the first override yielding a match wins.
    pub overrides: Vec<RegionalOverride>,
}

const REGION_TOMLS: &[(&str, &str)] = &[("colorado", include_str!("../regions/colorado.toml"))];

#[cfg(test)]
const EXPECTED_REGION_COUNT: usize = 1;

/// Returns every embedded regional override.
///
/// # Panics
///
/// Panics if any embedded TOML file is malformed.
#[must_use]
pub fn all_overrides() -> Vec<RegionalOverride> {
    REGION_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse region '{name}': {e}"))
        })
        .collect()
}

/// The resolver configuration built from the embedded overrides.
#[must_use]
pub fn resolver_config() -> ResolverConfig {
    ResolverConfig {
        default_max_distance_km: DEFAULT_MAX_DISTANCE_KM,
        overrides: all_overrides(),
    }
}

static EMBEDDED_RESOLVER: LazyLock<ResolverConfig> = LazyLock::new(resolver_config);

/// [`resolver_config`], parsed once per process.
#[must_use]
pub fn embedded_resolver() -> &'static ResolverConfig {
    &EMBEDDED_RESOLVER
}
