#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safety score composer.
//!
//! [`compose_safety_score`] is a pure function of the normalized signal
//! records. Rule blocks in [`rules`] append [`HazardFactor`]s in a fixed
//! order; each [`HazardGroup`]'s total is capped before it is subtracted
//! from 100. Confidence is computed separately in [`confidence`] from data
//! age and feed availability.

pub mod confidence;
pub mod rules;

use std::collections::BTreeMap;

use backcountry_signal_models::{
    AirQualitySignal, AlertsSignal, AvalancheSignal, FireRiskSignal, GroupImpact, HazardFactor,
    HazardGroup, PrecipitationSignal, SafetyRating, SafetyScoreResult, SnowpackSignal,
    WeatherRecord,
};
use chrono::{DateTime, Utc};

/// Label used when no factor was produced.
pub const NO_HAZARD: &str = "None";

/// Everything the composer reads.
#[derive(Debug, Clone, Copy)]
pub struct SafetySignals<'a> {
    /// Reference time for staleness and lead-time checks.
    pub now: DateTime<Utc>,
    pub selected_start: DateTime<Utc>,
    pub travel_window_hours: u32,
    pub weather: &'a WeatherRecord,
    pub avalanche: &'a AvalancheSignal,
    pub precipitation: &'a PrecipitationSignal,
    pub snowpack: &'a SnowpackSignal,
    pub alerts: &'a AlertsSignal,
    pub air_quality: &'a AirQualitySignal,
    pub fire: &'a FireRiskSignal,
}

/// Factors in the order the rule blocks produced them.
#[derive(Debug, Default)]
pub struct FactorLog {
    factors: Vec<HazardFactor>,
}

impl FactorLog {
    /// Appends a factor. Zero-point factors are dropped.
    pub fn push(
        &mut self,
        hazard: impl Into<String>,
        impact_points: u32,
        group: HazardGroup,
        message: impl Into<String>,
        source: &str,
    ) {
        if impact_points == 0 {
            return;
        }
        self.factors.push(HazardFactor {
            hazard: hazard.into(),
            impact_points,
            group,
            message: message.into(),
            source: source.to_string(),
        });
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<HazardFactor> {
        self.factors
    }
}

/// Composes the score, rating, primary hazard and confidence.
#[must_use]
pub fn compose_safety_score(signals: &SafetySignals<'_>) -> SafetyScoreResult {
    let mut log = FactorLog::default();
    rules::apply_all(signals, &mut log);
    let factors = log.into_inner();

    let group_impacts = group_impacts(&factors);
    let deduction: u32 = group_impacts.values().map(|g| g.capped).sum();
    let score = u8::try_from(100_u32.saturating_sub(deduction)).unwrap_or(0);

    let (confidence, confidence_reasons) = confidence::assess_confidence(signals);

    let primary_hazard = primary_hazard(&factors).to_string();
    log::debug!(
        "Composed score {score} (confidence {confidence}) from {} factors, primary {primary_hazard}",
        factors.len()
    );

    SafetyScoreResult {
        score,
        confidence,
        rating: SafetyRating::from_score(score),
        primary_hazard,
        factors,
        group_impacts,
        confidence_reasons,
    }
}

/// Raw and capped totals for every group, including empty ones.
#[must_use]
pub fn group_impacts(factors: &[HazardFactor]) -> BTreeMap<HazardGroup, GroupImpact> {
    HazardGroup::all()
        .iter()
        .map(|&group| {
            let raw = factors
                .iter()
                .filter(|f| f.group == group)
                .map(|f| f.impact_points)
                .sum::<u32>();
            let cap = group.cap();
            (
                group,
                GroupImpact {
                    raw,
                    capped: raw.min(cap),
                    cap,
                },
            )
        })
        .collect()
}

/// Hazard of the highest-impact factor; the first one wins a tie.
#[must_use]
pub fn primary_hazard(factors: &[HazardFactor]) -> &str {
    let mut best: Option<&HazardFactor> = None;
    for factor in factors {
        if best.is_none_or(|b| factor.impact_points > b.impact_points) {
            best = Some(factor);
        }
    }
    best.map_or(NO_HAZARD, |f| f.hazard.as_str())
}
