//! Visibility risk scoring.
//!
//! Weighted signals from the target hour (description keywords,
//! precipitation probability, blowing snow, saturation) plus the density
//! of risky hours across the trend. The total is clamped to 0-100.

use backcountry_signal_models::{VisibilityLevel, VisibilityRisk, WeatherPoint};

/// Description keywords and their weights. Checked in order; each group
/// counts once.
const KEYWORD_WEIGHTS: &[(&[&str], u32, &str)] = &[
    (&["fog"], 35, "Fog reported"),
    (&["snow", "blizzard"], 30, "Falling snow"),
    (&["smoke", "haze"], 18, "Smoke or haze"),
    (&["rain", "showers"], 12, "Rain"),
    (&["mist", "drizzle"], 12, "Mist or drizzle"),
    (&["heavy"], 10, "Heavy precipitation"),
];

/// Precipitation probability at or above which a trend hour counts as
/// risky.
const RISKY_HOUR_PRECIP_PCT: f64 = 60.0;

/// Scores visibility risk for the target hour and the following trend.
#[must_use]
pub fn assess_visibility(current: &WeatherPoint, trend: &[WeatherPoint]) -> VisibilityRisk {
    let mut score: u32 = 0;
    let mut factors = Vec::new();
    let description = current.description_lower();

    for (keywords, weight, label) in KEYWORD_WEIGHTS {
        if keywords.iter().any(|k| description.contains(k)) {
            score += weight;
            factors.push((*label).to_string());
        }
    }

    match current.precipitation_chance_pct {
        Some(p) if p >= 70.0 => {
            score += 20;
            factors.push(format!("{p:.0}% chance of precipitation"));
        }
        Some(p) if p >= 40.0 => {
            score += 10;
            factors.push(format!("{p:.0}% chance of precipitation"));
        }
        _ => {}
    }

    let snowing = description.contains("snow") || description.contains("blizzard");
    let gust = current.wind_gust_mph.unwrap_or(0.0);
    let wind = current.wind_speed_mph.unwrap_or(0.0);
    if snowing && gust >= 35.0 {
        score += 15;
        factors.push(format!("Blowing snow with gusts to {gust:.0} mph"));
    } else if wind >= 25.0 {
        score += 10;
        factors.push(format!("Sustained wind {wind:.0} mph"));
    }

    let humidity = current.humidity_pct.unwrap_or(0.0);
    let cloud = current.cloud_cover_pct.unwrap_or(0.0);
    if humidity >= 95.0 && cloud >= 90.0 {
        score += 15;
        factors.push("Saturated air under full cloud".to_string());
    } else if humidity >= 90.0 && cloud >= 80.0 {
        score += 8;
        factors.push("Near-saturated air under heavy cloud".to_string());
    }

    let active_hours = trend.iter().filter(|p| is_risky_hour(p)).count();
    if !trend.is_empty() {
        #[allow(clippy::cast_precision_loss)]
        let ratio = active_hours as f64 / trend.len() as f64;
        if ratio >= 0.5 {
            score += 15;
            factors.push(format!("Reduced visibility in {active_hours} of {} hours", trend.len()));
        } else if ratio >= 0.25 {
            score += 8;
            factors.push(format!("Reduced visibility in {active_hours} of {} hours", trend.len()));
        }
    }

    let score = u8::try_from(score.min(100)).unwrap_or(100);

    VisibilityRisk {
        score,
        level: VisibilityLevel::from_score(score),
        factors,
        active_hours,
    }
}

fn is_risky_hour(point: &WeatherPoint) -> bool {
    let description = point.description_lower();
    let keyword = KEYWORD_WEIGHTS
        .iter()
        .flat_map(|(keywords, _, _)| keywords.iter())
        .any(|k| description.contains(k));
    keyword
        || point
            .precipitation_chance_pct
            .is_some_and(|p| p >= RISKY_HOUR_PRECIP_PCT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn described(text: &str) -> WeatherPoint {
        WeatherPoint {
            description: Some(text.to_string()),
            ..WeatherPoint::default()
        }
    }

    #[test]
    fn clear_hour_is_minimal() {
        let risk = assess_visibility(&described("Sunny"), &[described("Sunny")]);
        assert_eq!(risk.score, 0);
        assert_eq!(risk.level, VisibilityLevel::Minimal);
        assert!(risk.factors.is_empty());
        assert_eq!(risk.active_hours, 0);
    }

    #[test]
    fn fog_and_saturation_stack() {
        let current = WeatherPoint {
            humidity_pct: Some(98.0),
            cloud_cover_pct: Some(100.0),
            ..described("Patchy Fog")
        };
        let risk = assess_visibility(&current, &[]);
        assert_eq!(risk.score, 50);
        assert_eq!(risk.level, VisibilityLevel::Moderate);
        assert_eq!(risk.factors.len(), 2);
    }

    #[test]
    fn blowing_snow_replaces_plain_wind_signal() {
        let current = WeatherPoint {
            wind_speed_mph: Some(30.0),
            wind_gust_mph: Some(45.0),
            precipitation_chance_pct: Some(80.0),
            ..described("Heavy Snow")
        };
        let trend = vec![described("Snow"), described("Snow"), described("Cloudy")];
        let risk = assess_visibility(&current, &trend);
        // snow 30 + heavy 10 + precip 20 + blowing snow 15 + trend 15
        assert_eq!(risk.score, 90);
        assert_eq!(risk.level, VisibilityLevel::Extreme);
        assert_eq!(risk.active_hours, 2);
    }

    #[test]
    fn score_is_clamped() {
        let current = WeatherPoint {
            wind_gust_mph: Some(60.0),
            precipitation_chance_pct: Some(100.0),
            humidity_pct: Some(100.0),
            cloud_cover_pct: Some(100.0),
            ..described("Heavy snow and blizzard with fog, smoke and drizzle")
        };
        let trend = vec![described("Blizzard"); 4];
        let risk = assess_visibility(&current, &trend);
        assert_eq!(risk.score, 100);
    }

    #[test]
    fn trend_quarter_risky_adds_smaller_bump() {
        let trend = vec![
            WeatherPoint {
                precipitation_chance_pct: Some(65.0),
                ..WeatherPoint::default()
            },
            described("Clear"),
            described("Clear"),
            described("Clear"),
        ];
        let risk = assess_visibility(&WeatherPoint::default(), &trend);
        assert_eq!(risk.score, 8);
        assert_eq!(risk.active_hours, 1);
    }
}
