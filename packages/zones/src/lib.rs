#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Avalanche forecast zone resolution.
//!
//! Matches a coordinate to the forecast zone polygon that covers it. Zone
//! polygons have gaps, so resolution falls back in a fixed order:
//!
//! 1. point-in-polygon against every feature (first match wins);
//! 2. nearest polygon vertex by great-circle distance, within the default
//!    threshold;
//! 3. regional overrides from the [`registry`]: inside a configured
//!    bounding box, nearest vertex among that center's zones with a
//!    widened threshold;
//! 4. no match.
//!
//! Distance ties are broken by iteration order (the first minimum found
//! wins). The zone features themselves come from the periodically
//! refreshed map layer held in [`cache::ZoneLayerCache`].

pub mod avalanche;
pub mod cache;
pub mod layer;
pub mod registry;

use backcountry_signal_models::{Coordinate, ZoneMatchMode};
use backcountry_source::SourceError;
use chrono::{DateTime, Utc};
use geo::{Contains, Distance, Haversine, MultiPolygon, Point};

use crate::registry::{RegionalOverride, ResolverConfig};

/// Errors from zone layer acquisition.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    /// The payload is not a feature collection (no `features` array).
    #[error("Malformed zone payload: {message}")]
    MalformedPayload {
        /// Description of what was wrong with the payload.
        message: String,
    },

    /// The upstream fetch failed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl ZoneError {
    /// Whether this error must abort the request instead of degrading to
    /// an unavailable avalanche signal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}

/// One avalanche forecast zone from the map layer.
#[derive(Debug, Clone)]
pub struct ForecastZoneFeature {
    /// Feature identifier, if the layer provides one.
    pub zone_id: Option<String>,
    /// Forecast center identifier (e.g. `"CAIC"`).
    pub center_id: String,
    /// Zone name.
    pub name: String,
    /// State or province code.
    pub state: Option<String>,
    /// Published danger level; `-1` means "no rating".
    pub danger_level: Option<i64>,
    /// Published danger label.
    pub danger: Option<String>,
    /// Travel advice text.
    pub travel_advice: Option<String>,
    /// Link to the full bulletin.
    pub link: Option<String>,
    /// Whether the center is outside its forecasting season.
    pub off_season: bool,
    /// Bulletin validity start.
    pub start_date: Option<DateTime<Utc>>,
    /// Bulletin validity end.
    pub end_date: Option<DateTime<Utc>>,
    /// Zone boundary (lon/lat degrees).
    pub geometry: MultiPolygon<f64>,
}

/// Result of [`resolve_zone`].
///
/// `mode == Polygon` implies `fallback_distance_km == Some(0.0)`;
/// `mode == None` implies `feature.is_none()`.
#[derive(Debug, Clone, Copy)]
pub struct ZoneMatch<'a> {
    /// The matched feature.
    pub feature: Option<&'a ForecastZoneFeature>,
    /// How the feature was matched.
    pub mode: ZoneMatchMode,
    /// Distance to the matched zone (km).
    pub fallback_distance_km: Option<f64>,
}

impl<'a> ZoneMatch<'a> {
    const fn polygon(feature: &'a ForecastZoneFeature) -> Self {
        Self {
            feature: Some(feature),
            mode: ZoneMatchMode::Polygon,
            fallback_distance_km: Some(0.0),
        }
    }

    const fn nearest(feature: &'a ForecastZoneFeature, distance_km: f64) -> Self {
        Self {
            feature: Some(feature),
            mode: ZoneMatchMode::Nearest,
            fallback_distance_km: Some(distance_km),
        }
    }

    /// A result with no covering or neighboring zone.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            feature: None,
            mode: ZoneMatchMode::None,
            fallback_distance_km: None,
        }
    }
}

/// Resolves the forecast zone for `coord` using the embedded resolver
/// configuration.
#[must_use]
pub fn resolve_zone<'a>(coord: &Coordinate, features: &'a [ForecastZoneFeature]) -> ZoneMatch<'a> {
    resolve_zone_with(coord, features, registry::embedded_resolver())
}

/// Resolves the forecast zone for `coord` with an explicit configuration.
#[must_use]
pub fn resolve_zone_with<'a>(
    coord: &Coordinate,
    features: &'a [ForecastZoneFeature],
    config: &ResolverConfig,
) -> ZoneMatch<'a> {
    let point = Point::new(coord.lon, coord.lat);

    if let Some(feature) = features.iter().find(|f| f.geometry.contains(&point)) {
        return ZoneMatch::polygon(feature);
    }

    if let Some((feature, distance_km)) = nearest_vertex(point, features.iter())
        && distance_km <= config.default_max_distance_km
    {
        return ZoneMatch::nearest(feature, distance_km);
    }

    for region in config.overrides.iter().filter(|r| r.bounds.contains(coord)) {
        if let Some(found) = resolve_regional(point, features, region) {
            log::debug!(
                "Zone for {coord} resolved through regional override {} ({:.1} km)",
                region.id,
                found.fallback_distance_km.unwrap_or_default()
            );
            return found;
        }
    }

    ZoneMatch::none()
}

fn resolve_regional<'a>(
    point: Point<f64>,
    features: &'a [ForecastZoneFeature],
    region: &RegionalOverride,
) -> Option<ZoneMatch<'a>> {
    let candidates = features.iter().filter(|f| f.center_id == region.center_id);
    let (feature, distance_km) = nearest_vertex(point, candidates)?;
    (distance_km <= region.max_distance_km).then(|| ZoneMatch::nearest(feature, distance_km))
}

/// Finds the feature with the vertex closest to `point`.
///
/// Strict less-than keeps the first minimum found on ties.
fn nearest_vertex<'a>(
    point: Point<f64>,
    features: impl Iterator<Item = &'a ForecastZoneFeature>,
) -> Option<(&'a ForecastZoneFeature, f64)> {
    let mut best: Option<(&ForecastZoneFeature, f64)> = None;

    for feature in features {
        let Some(distance_km) = min_vertex_distance_km(point, &feature.geometry) else {
            continue;
        };
        match best {
            Some((_, current)) if distance_km >= current => {}
            _ => best = Some((feature, distance_km)),
        }
    }

    best
}

/// Minimum haversine distance (km) from `point` to any vertex of `geometry`,
/// exterior and interior rings included.
fn min_vertex_distance_km(point: Point<f64>, geometry: &MultiPolygon<f64>) -> Option<f64> {
    geometry
        .iter()
        .flat_map(|polygon| {
            std::iter::once(polygon.exterior()).chain(polygon.interiors().iter())
        })
        .flat_map(|ring| ring.coords())
        .map(|c| haversine_km(point, Point::from(*c)))
        .min_by(f64::total_cmp)
}

/// Great-circle distance in kilometres.
#[must_use]
pub fn haversine_km(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b) / 1000.0
}
