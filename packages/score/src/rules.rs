//! Hazard rule blocks.
//!
//! Every block only appends factors. Thresholds are checked from most to
//! least severe and the first hit wins within a tier table.

use backcountry_signal_models::{
    AlertSeverity, FireRiskLevel, HazardGroup, HistoricalStatus, SignalStatus, WeatherPoint,
    ZoneMatchMode,
};
use chrono::Duration;

use crate::{FactorLog, SafetySignals};

const CURRENT_WIND: &[(f64, u32)] = &[(50.0, 24), (40.0, 16), (30.0, 10), (20.0, 4)];
const TREND_WIND: &[(f64, u32)] = &[(45.0, 20), (35.0, 12), (25.0, 6)];
const WINDY_HOUR_MPH: f64 = 30.0;
const WINDY_HOURS: usize = 4;
const WINDY_HOURS_POINTS: u32 = 8;

const PRECIP_CHANCE: &[(f64, u32)] = &[(70.0, 10), (50.0, 6)];
const WET_HOUR_PCT: f64 = 60.0;
const WET_HOURS: usize = 3;
const THUNDER_POINTS: u32 = 12;

const SNOW_AHEAD: &[(f64, u32)] = &[(6.0, 14), (2.0, 8)];
const RAIN_AHEAD: &[(f64, u32)] = &[(0.5, 8), (0.2, 4)];
const RECENT_SNOW_24H: &[(f64, u32)] = &[(12.0, 10)];

const VISIBILITY: &[(f64, u32)] = &[(80.0, 14), (60.0, 10), (40.0, 5)];

const COLD: &[(f64, u32)] = &[(-20.0, 18), (-10.0, 12), (0.0, 8)];
const COLD_HOURS: usize = 4;
const HEAT: &[(f64, u32)] = &[(100.0, 16), (90.0, 10), (85.0, 4)];
const HOT_HOUR_F: f64 = 90.0;
const HOT_HOURS: usize = 3;
const EXPOSURE_HOURS_POINTS: u32 = 6;

const ICY_RAIN_24H_IN: f64 = 0.25;
const ICY_MAX_TEMP_F: f64 = 34.0;
const FRESH_SNOW_24H_IN: f64 = 4.0;

const DARKNESS_POINTS: u32 = 8;

const AQI: &[(f64, u32)] = &[(301.0, 20), (201.0, 18), (151.0, 14), (101.0, 8)];

/// Points for the first threshold `value` reaches, in a descending table.
fn at_least(value: f64, table: &[(f64, u32)]) -> u32 {
    table
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map_or(0, |(_, points)| *points)
}

/// Points for the first threshold `value` falls to, in an ascending table.
fn at_most(value: f64, table: &[(f64, u32)]) -> u32 {
    table
        .iter()
        .find(|(threshold, _)| value <= *threshold)
        .map_or(0, |(_, points)| *points)
}

fn count_hours(trend: &[WeatherPoint], predicate: impl Fn(&WeatherPoint) -> bool) -> usize {
    trend.iter().filter(|p| predicate(p)).count()
}

/// Runs every block in order.
pub fn apply_all(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    avalanche(signals, log);
    if signals.weather.status.has_data() {
        wind(signals, log);
        storm(signals, log);
    }
    accumulation(signals, log);
    if signals.weather.status.has_data() {
        visibility(signals, log);
        cold(signals, log);
        heat(signals, log);
    }
    surface(signals, log);
    if signals.weather.status.has_data() {
        darkness(signals, log);
    }
    lead_time(signals, log);
    alerts(signals, log);
    air_quality(signals, log);
    fire(signals, log);
}

pub fn avalanche(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let avy = signals.avalanche;
    let zone = avy.zone_name.as_deref().unwrap_or("the matched zone");

    if avy.status.has_data() {
        if let Some(level) = avy.danger_level {
            let points = match level {
                4.. => 52,
                3 => 34,
                2 => 15,
                _ => 0,
            };
            let label = avy.danger_label.as_deref().unwrap_or("rated");
            log.push(
                "Avalanche",
                points,
                HazardGroup::Avalanche,
                format!("Avalanche danger is {label} (level {level}) in {zone}"),
                "avalanche",
            );
        } else {
            log.push(
                "Avalanche uncertainty",
                10,
                HazardGroup::Avalanche,
                format!("{zone} has a current bulletin without a danger rating"),
                "avalanche",
            );
        }
        if avy.match_mode == ZoneMatchMode::Nearest {
            let distance = avy.fallback_distance_km.unwrap_or_default();
            log.push(
                "Avalanche uncertainty",
                6,
                HazardGroup::Avalanche,
                format!("Outside every forecast zone; nearest is {zone}, {distance:.0} km away"),
                "avalanche",
            );
        }
        return;
    }

    if avy.status == SignalStatus::NoneForSelectedStart {
        log.push(
            "Avalanche uncertainty",
            12,
            HazardGroup::Avalanche,
            "The avalanche bulletin does not cover the selected start",
            "avalanche",
        );
        return;
    }

    let snowpack = signals.snowpack;
    if avy.status != SignalStatus::OffSeason && snowpack.status.has_data() {
        let above_average = snowpack
            .comparison
            .as_ref()
            .is_some_and(|c| c.status == HistoricalStatus::AboveAverage);
        let deep = snowpack.snow_water_equivalent_in.is_some_and(|swe| swe >= 2.0);
        if above_average || deep {
            log.push(
                "Avalanche uncertainty",
                15,
                HazardGroup::Avalanche,
                "Snow is on the ground but no avalanche forecast covers this location",
                "snowpack",
            );
        }
    }
}

pub fn wind(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let weather = signals.weather;
    if let Some(peak) = weather.current.peak_wind_mph() {
        log.push(
            "Wind",
            at_least(peak, CURRENT_WIND),
            HazardGroup::Weather,
            format!("Wind to {peak:.0} mph at the start"),
            "weather",
        );
    }

    let trend_peak = weather
        .trend
        .iter()
        .filter_map(WeatherPoint::peak_wind_mph)
        .reduce(f64::max);
    if let Some(peak) = trend_peak {
        log.push(
            "Wind",
            at_least(peak, TREND_WIND),
            HazardGroup::Weather,
            format!("Wind peaks at {peak:.0} mph during the trip"),
            "weather",
        );
    }

    let windy = count_hours(&weather.trend, |p| {
        p.peak_wind_mph().is_some_and(|w| w >= WINDY_HOUR_MPH)
    });
    if windy >= WINDY_HOURS {
        log.push(
            "Wind",
            WINDY_HOURS_POINTS,
            HazardGroup::Weather,
            format!("{windy} hours with wind of {WINDY_HOUR_MPH:.0} mph or more"),
            "weather",
        );
    }
}

pub fn storm(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let weather = signals.weather;
    if let Some(chance) = weather.current.precipitation_chance_pct {
        log.push(
            "Storm",
            at_least(chance, PRECIP_CHANCE),
            HazardGroup::Weather,
            format!("{chance:.0}% chance of precipitation at the start"),
            "weather",
        );
    }

    let wet = count_hours(&weather.trend, |p| {
        p.precipitation_chance_pct.is_some_and(|c| c >= WET_HOUR_PCT)
    });
    if wet >= WET_HOURS {
        log.push(
            "Storm",
            EXPOSURE_HOURS_POINTS,
            HazardGroup::Weather,
            format!("{wet} hours with a {WET_HOUR_PCT:.0}%+ chance of precipitation"),
            "weather",
        );
    }

    let thunder = std::iter::once(&weather.current)
        .chain(&weather.trend)
        .any(|p| p.description_lower().contains("thunder"));
    if thunder {
        log.push(
            "Lightning",
            THUNDER_POINTS,
            HazardGroup::Weather,
            "Thunderstorms in the forecast",
            "weather",
        );
    }
}

pub fn accumulation(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let precip = signals.precipitation;
    if precip.fallback_mode || !precip.status.has_data() {
        return;
    }

    if let Some(snow) = precip.snow.ahead.total {
        log.push(
            "Snowfall",
            at_least(snow, SNOW_AHEAD),
            HazardGroup::Weather,
            format!(
                "{snow:.1} in of snow expected in the next {} hours",
                precip.snow.ahead.window_hours
            ),
            "precipitation",
        );
    }
    if let Some(rain) = precip.rain.ahead.total {
        log.push(
            "Rain",
            at_least(rain, RAIN_AHEAD),
            HazardGroup::Weather,
            format!(
                "{rain:.2} in of rain expected in the next {} hours",
                precip.rain.ahead.window_hours
            ),
            "precipitation",
        );
    }
    if let Some(recent) = precip.snow.past_24h.total {
        log.push(
            "Snowfall",
            at_least(recent, RECENT_SNOW_24H),
            HazardGroup::Weather,
            format!("{recent:.1} in of snow in the past 24 hours"),
            "precipitation",
        );
    }
}

pub fn visibility(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let Some(risk) = &signals.weather.visibility_risk else {
        return;
    };
    log.push(
        "Visibility",
        at_least(f64::from(risk.score), VISIBILITY),
        HazardGroup::Weather,
        format!("Visibility risk is {} ({}/100)", risk.level, risk.score),
        "weather",
    );
}

pub fn cold(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let weather = signals.weather;
    if let Some(feels) = weather.current.feels_like_f() {
        log.push(
            "Cold",
            at_most(feels, COLD),
            HazardGroup::Weather,
            format!("Feels like {feels:.0}F at the start"),
            "weather",
        );
    }

    let frigid = count_hours(&weather.trend, |p| p.feels_like_f().is_some_and(|t| t <= 0.0));
    if frigid >= COLD_HOURS {
        log.push(
            "Cold",
            EXPOSURE_HOURS_POINTS,
            HazardGroup::Weather,
            format!("{frigid} hours at or below 0F"),
            "weather",
        );
    }
}

pub fn heat(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let weather = signals.weather;
    if let Some(temp) = weather.current.feels_like_f() {
        log.push(
            "Heat",
            at_least(temp, HEAT),
            HazardGroup::Weather,
            format!("Feels like {temp:.0}F at the start"),
            "weather",
        );
    }

    let hot = count_hours(&weather.trend, |p| {
        p.feels_like_f().is_some_and(|t| t >= HOT_HOUR_F)
    });
    if hot >= HOT_HOURS {
        log.push(
            "Heat",
            EXPOSURE_HOURS_POINTS,
            HazardGroup::Weather,
            format!("{hot} hours at or above {HOT_HOUR_F:.0}F"),
            "weather",
        );
    }
}

pub fn surface(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let precip = signals.precipitation;
    if precip.fallback_mode || !precip.status.has_data() {
        return;
    }

    let recent_rain = precip.rain.past_24h.total.unwrap_or_default();
    let freezing = signals
        .weather
        .current
        .temperature_f
        .is_some_and(|t| t <= ICY_MAX_TEMP_F);
    if recent_rain >= ICY_RAIN_24H_IN && freezing {
        log.push(
            "Icy surfaces",
            8,
            HazardGroup::Weather,
            format!("{recent_rain:.2} in of rain in the past 24 hours near freezing"),
            "precipitation",
        );
    }

    let recent_snow = precip.snow.past_24h.total.unwrap_or_default();
    if recent_snow >= FRESH_SNOW_24H_IN {
        log.push(
            "Fresh snow",
            5,
            HazardGroup::Weather,
            format!("{recent_snow:.1} in of new snow may hide the trail"),
            "precipitation",
        );
    }
}

pub fn darkness(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    if signals.weather.current.is_daytime == Some(false) {
        log.push(
            "Darkness",
            DARKNESS_POINTS,
            HazardGroup::Weather,
            "The trip starts in darkness",
            "weather",
        );
    }
}

pub fn lead_time(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let lead = signals.selected_start - signals.now;
    let points = if lead > Duration::hours(120) {
        10
    } else if lead > Duration::hours(72) {
        6
    } else {
        0
    };
    log.push(
        "Forecast lead time",
        points,
        HazardGroup::Weather,
        format!(
            "The start is {} days out; forecasts this far ahead are less reliable",
            lead.num_days()
        ),
        "weather",
    );
}

pub fn alerts(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    if !signals.alerts.status.has_data() {
        return;
    }
    for alert in signals.alerts.valid_at(signals.selected_start) {
        let points = match alert.severity {
            AlertSeverity::Extreme => 24,
            AlertSeverity::Severe => 18,
            AlertSeverity::Moderate => 10,
            AlertSeverity::Minor | AlertSeverity::Unknown => 5,
        };
        let message = alert
            .headline
            .clone()
            .unwrap_or_else(|| format!("{} in effect", alert.event));
        log.push(alert.event.clone(), points, HazardGroup::Alerts, message, "alerts");
    }
}

pub fn air_quality(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let aq = signals.air_quality;
    if !aq.status.has_data() {
        return;
    }
    if let Some(aqi) = aq.us_aqi {
        let category = aq.category.as_deref().unwrap_or("poor");
        log.push(
            "Air quality",
            at_least(f64::from(aqi), AQI),
            HazardGroup::AirQuality,
            format!("US AQI {aqi} ({category})"),
            "airQuality",
        );
    }
}

pub fn fire(signals: &SafetySignals<'_>, log: &mut FactorLog) {
    let fire = signals.fire;
    if !fire.status.has_data() {
        return;
    }
    let Some(level) = fire.level else {
        return;
    };
    let points = match level {
        FireRiskLevel::Extreme => 18,
        FireRiskLevel::VeryHigh => 14,
        FireRiskLevel::High => 10,
        FireRiskLevel::Moderate => 5,
        FireRiskLevel::Low => 0,
    };
    let message = if fire.reasons.is_empty() {
        format!("Fire weather risk is {level}")
    } else {
        format!("Fire weather risk is {level}: {}", fire.reasons.join("; "))
    };
    log.push("Fire", points, HazardGroup::Fire, message, "fire");
}

#[cfg(test)]
mod tests {
    use backcountry_signal_models::{
        AirQualitySignal, AlertsSignal, AvalancheSignal, FireRiskSignal, HistoricalComparison,
        OfficialAlert, PrecipitationSignal, SnowpackSignal, WeatherRecord,
    };
    use chrono::{DateTime, TimeZone as _, Utc};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 15, 0, 0).unwrap()
    }

    fn run(
        block: fn(&SafetySignals<'_>, &mut FactorLog),
        weather: &WeatherRecord,
        avalanche: &AvalancheSignal,
        snowpack: &SnowpackSignal,
        alerts: &AlertsSignal,
        start_offset_hours: i64,
    ) -> Vec<(String, u32)> {
        let precipitation = PrecipitationSignal {
            status: SignalStatus::Unavailable,
            source: backcountry_signal_models::PrecipitationSource::Fallback,
            fallback_mode: true,
            fetched_at: None,
            rain: zero_windows(),
            snow: zero_windows(),
        };
        let signals = SafetySignals {
            now: now(),
            selected_start: now() + Duration::hours(start_offset_hours),
            travel_window_hours: 6,
            weather,
            avalanche,
            precipitation: &precipitation,
            snowpack,
            alerts,
            air_quality: &AirQualitySignal::default(),
            fire: &FireRiskSignal::default(),
        };
        let mut log = FactorLog::default();
        block(&signals, &mut log);
        log.into_inner()
            .into_iter()
            .map(|f| (f.hazard, f.impact_points))
            .collect()
    }

    fn zero_windows() -> backcountry_signal_models::PrecipitationWindows {
        let window = |hours| backcountry_signal_models::AccumulationWindow {
            anchor: now(),
            window_hours: hours,
            total: Some(0.0),
        };
        backcountry_signal_models::PrecipitationWindows {
            past_12h: window(12),
            past_24h: window(24),
            past_48h: window(48),
            ahead: window(6),
        }
    }

    fn avalanche_level(level: Option<u8>, mode: ZoneMatchMode) -> AvalancheSignal {
        AvalancheSignal {
            status: SignalStatus::Ok,
            zone_name: Some("Front Range".to_string()),
            match_mode: mode,
            danger_level: level,
            fallback_distance_km: (mode == ZoneMatchMode::Nearest).then_some(12.0),
            ..AvalancheSignal::default()
        }
    }

    fn run_avalanche(avalanche: &AvalancheSignal, snowpack: &SnowpackSignal) -> Vec<(String, u32)> {
        run(
            super::avalanche,
            &WeatherRecord::default(),
            avalanche,
            snowpack,
            &AlertsSignal::default(),
            0,
        )
    }

    #[test]
    fn avalanche_danger_tiers() {
        let none = SnowpackSignal::default();
        let points = |level| {
            run_avalanche(&avalanche_level(Some(level), ZoneMatchMode::Polygon), &none)
                .first()
                .map_or(0, |f| f.1)
        };
        assert_eq!(points(5), 52);
        assert_eq!(points(4), 52);
        assert_eq!(points(3), 34);
        assert_eq!(points(2), 15);
        assert_eq!(points(1), 0);
    }

    #[test]
    fn nearest_zone_adds_uncertainty() {
        let factors = run_avalanche(
            &avalanche_level(Some(3), ZoneMatchMode::Nearest),
            &SnowpackSignal::default(),
        );
        assert_eq!(
            factors,
            vec![
                ("Avalanche".to_string(), 34),
                ("Avalanche uncertainty".to_string(), 6)
            ]
        );
    }

    #[test]
    fn unrated_and_out_of_window_bulletins() {
        let unrated = run_avalanche(
            &avalanche_level(None, ZoneMatchMode::Polygon),
            &SnowpackSignal::default(),
        );
        assert_eq!(unrated, vec![("Avalanche uncertainty".to_string(), 10)]);

        let stale = AvalancheSignal {
            status: SignalStatus::NoneForSelectedStart,
            ..AvalancheSignal::default()
        };
        assert_eq!(
            run_avalanche(&stale, &SnowpackSignal::default()),
            vec![("Avalanche uncertainty".to_string(), 12)]
        );
    }

    #[test]
    fn snowpack_without_forecast() {
        let deep = SnowpackSignal {
            status: SignalStatus::Ok,
            snow_water_equivalent_in: Some(1.0),
            comparison: Some(HistoricalComparison {
                status: HistoricalStatus::AboveAverage,
                ..HistoricalComparison::default()
            }),
            ..SnowpackSignal::default()
        };
        let unavailable = AvalancheSignal::unavailable();
        assert_eq!(
            run_avalanche(&unavailable, &deep),
            vec![("Avalanche uncertainty".to_string(), 15)]
        );

        let off_season = AvalancheSignal {
            status: SignalStatus::OffSeason,
            ..AvalancheSignal::default()
        };
        assert!(run_avalanche(&off_season, &deep).is_empty());
    }

    #[test]
    fn lead_time_tiers() {
        let weather = WeatherRecord::default();
        let lead = |hours| {
            run(
                lead_time,
                &weather,
                &AvalancheSignal::default(),
                &SnowpackSignal::default(),
                &AlertsSignal::default(),
                hours,
            )
        };
        assert!(lead(48).is_empty());
        assert_eq!(lead(96), vec![("Forecast lead time".to_string(), 6)]);
        assert_eq!(lead(130), vec![("Forecast lead time".to_string(), 10)]);
    }

    #[test]
    fn only_alerts_valid_at_start_count() {
        let alerts = AlertsSignal {
            status: SignalStatus::Ok,
            alerts: vec![
                OfficialAlert {
                    event: "Winter Storm Warning".to_string(),
                    headline: None,
                    severity: AlertSeverity::Severe,
                    onset: Some(now() - Duration::hours(2)),
                    expires: Some(now() + Duration::hours(10)),
                    sender: None,
                },
                OfficialAlert {
                    event: "Wind Advisory".to_string(),
                    headline: None,
                    severity: AlertSeverity::Moderate,
                    onset: None,
                    expires: Some(now() - Duration::hours(1)),
                    sender: None,
                },
            ],
        };
        let factors = run(
            super::alerts,
            &WeatherRecord::default(),
            &AvalancheSignal::default(),
            &SnowpackSignal::default(),
            &alerts,
            0,
        );
        assert_eq!(factors, vec![("Winter Storm Warning".to_string(), 18)]);
    }

    #[test]
    fn cold_and_heat_thresholds() {
        let point = |feels: f64| WeatherPoint {
            apparent_temperature_f: Some(feels),
            ..WeatherPoint::default()
        };
        let record = |current: WeatherPoint, trend: Vec<WeatherPoint>| WeatherRecord {
            status: SignalStatus::Ok,
            current,
            trend,
            ..WeatherRecord::default()
        };
        let eval = |block: fn(&SafetySignals<'_>, &mut FactorLog), weather: &WeatherRecord| {
            run(
                block,
                weather,
                &AvalancheSignal::default(),
                &SnowpackSignal::default(),
                &AlertsSignal::default(),
                0,
            )
        };

        let frigid = record(point(-25.0), vec![point(-5.0); 4]);
        assert_eq!(
            eval(cold, &frigid),
            vec![("Cold".to_string(), 18), ("Cold".to_string(), 6)]
        );
        assert!(eval(heat, &frigid).is_empty());

        let hot = record(point(92.0), vec![point(95.0); 2]);
        assert_eq!(eval(heat, &hot), vec![("Heat".to_string(), 10)]);
    }

    #[test]
    fn tier_tables() {
        assert_eq!(at_least(45.0, TREND_WIND), 20);
        assert_eq!(at_least(44.9, TREND_WIND), 12);
        assert_eq!(at_least(10.0, TREND_WIND), 0);
        assert_eq!(at_most(-10.0, COLD), 12);
        assert_eq!(at_most(1.0, COLD), 0);
    }
}
