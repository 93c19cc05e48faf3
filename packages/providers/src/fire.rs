//! Fire-weather risk derived from the weather record and official alerts.

use backcountry_signal_models::{
    AlertsSignal, FireRiskLevel, FireRiskSignal, SignalStatus, WeatherRecord,
};
use chrono::{DateTime, Utc};

/// Assesses fire-weather risk at `start`.
///
/// Valid Red Flag Warnings and Fire Weather Watches take precedence over
/// the humidity/wind/temperature thresholds, which are read from the
/// weather record's target hour. If neither input carries data the result
/// is `unavailable`.
#[must_use]
pub fn assess_fire_risk(
    weather: &WeatherRecord,
    alerts: &AlertsSignal,
    start: DateTime<Utc>,
) -> FireRiskSignal {
    let weather_usable = weather.status.has_data();
    if !weather_usable && !alerts.status.has_data() {
        return FireRiskSignal {
            status: SignalStatus::Unavailable,
            level: None,
            reasons: Vec::new(),
        };
    }

    let mut level = FireRiskLevel::Low;
    let mut reasons = Vec::new();

    for alert in alerts.valid_at(start) {
        let event = alert.event.to_lowercase();
        if event.contains("red flag") {
            level = level.max(FireRiskLevel::Extreme);
            reasons.push(format!("{} in effect", alert.event));
        } else if event.contains("fire weather") {
            level = level.max(FireRiskLevel::High);
            reasons.push(format!("{} in effect", alert.event));
        }
    }

    if weather_usable {
        let current = &weather.current;
        let humidity = current.humidity_pct;
        let wind = current.peak_wind_mph();
        let temp = current.temperature_f;

        let (tier, reason) = match (humidity, wind, temp) {
            (Some(h), Some(w), _) if h <= 15.0 && w >= 25.0 => (
                FireRiskLevel::VeryHigh,
                Some(format!("Humidity {h:.0}% with wind {w:.0} mph")),
            ),
            (Some(h), Some(w), Some(t)) if h <= 20.0 && w >= 15.0 && t >= 75.0 => (
                FireRiskLevel::High,
                Some(format!("Humidity {h:.0}%, wind {w:.0} mph, {t:.0}F")),
            ),
            (Some(h), _, Some(t)) if h <= 25.0 && t >= 80.0 => (
                FireRiskLevel::Moderate,
                Some(format!("Humidity {h:.0}% at {t:.0}F")),
            ),
            _ => (FireRiskLevel::Low, None),
        };
        if let Some(reason) = reason {
            level = level.max(tier);
            reasons.push(reason);
        }
    }

    let status = if weather_usable && alerts.status.has_data() {
        SignalStatus::Ok
    } else {
        SignalStatus::Partial
    };

    FireRiskSignal {
        status,
        level: Some(level),
        reasons,
    }
}
