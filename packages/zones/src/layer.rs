//! Normalization of the avalanche forecast map layer.
//!
//! The layer is a GeoJSON feature collection where each feature is one
//! forecast zone with its current danger rating in `properties`. Features
//! whose geometry cannot be read as a (multi)polygon are skipped; a payload
//! without a `features` array is rejected as malformed.

use chrono::{DateTime, NaiveDateTime, Utc};
use geo::MultiPolygon;
use serde_json::Value;

use crate::{ForecastZoneFeature, ZoneError};

/// Parses a map-layer payload into zone features.
///
/// # Errors
///
/// Returns [`ZoneError::MalformedPayload`] if the payload has no
/// `features` array.
pub fn parse_map_layer(payload: &Value) -> Result<Vec<ForecastZoneFeature>, ZoneError> {
    let features = payload
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| ZoneError::MalformedPayload {
            message: "missing 'features' array".to_string(),
        })?;

    let mut zones = Vec::with_capacity(features.len());
    let mut skipped = 0_usize;

    for feature in features {
        match parse_feature(feature) {
            Some(zone) => zones.push(zone),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} zone features with unreadable geometry");
    }
    log::debug!("Parsed {} forecast zones", zones.len());

    Ok(zones)
}

fn parse_feature(feature: &Value) -> Option<ForecastZoneFeature> {
    let geometry = parse_geometry(feature.get("geometry")?)?;
    let empty = Value::Null;
    let props = feature.get("properties").unwrap_or(&empty);

    Some(ForecastZoneFeature {
        zone_id: feature.get("id").and_then(value_to_string),
        center_id: str_prop(props, "center_id").unwrap_or_default(),
        name: str_prop(props, "name").unwrap_or_default(),
        state: str_prop(props, "state"),
        danger_level: props.get("danger_level").and_then(Value::as_i64),
        danger: str_prop(props, "danger"),
        travel_advice: str_prop(props, "travel_advice"),
        link: str_prop(props, "link"),
        off_season: props
            .get("off_season")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        start_date: props.get("start_date").and_then(parse_timestamp),
        end_date: props.get("end_date").and_then(parse_timestamp),
        geometry,
    })
}

fn parse_geometry(value: &Value) -> Option<MultiPolygon<f64>> {
    let geom: geojson::Geometry = serde_json::from_value(value.clone()).ok()?;
    let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

fn str_prop(props: &Value, key: &str) -> Option<String> {
    props
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339 timestamps and naive `YYYY-MM-DDTHH:MM:SS` /
/// `YYYY-MM-DD HH:MM:SS` timestamps, which are taken as UTC.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
