//! Hazard factors and the composed safety score.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Hazard category. Each group's total deduction is capped independently.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum HazardGroup {
    /// Avalanche danger and forecast uncertainty.
    Avalanche,
    /// Wind, storm, visibility, temperature, surface, darkness, lead time.
    Weather,
    /// Official alerts.
    Alerts,
    /// Air quality.
    AirQuality,
    /// Fire weather.
    Fire,
}

impl HazardGroup {
    /// Maximum points this group may deduct from the score.
    #[must_use]
    pub const fn cap(self) -> u32 {
        match self {
            Self::Avalanche => 55,
            Self::Weather => 42,
            Self::Alerts => 24,
            Self::AirQuality => 20,
            Self::Fire => 18,
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Avalanche,
            Self::Weather,
            Self::Alerts,
            Self::AirQuality,
            Self::Fire,
        ]
    }
}

/// One additive contribution to score loss.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardFactor {
    /// Short hazard name (e.g. `"Avalanche"`, `"Wind"`).
    pub hazard: String,
    /// Points deducted, always positive.
    pub impact_points: u32,
    /// Group the factor counts against.
    pub group: HazardGroup,
    /// Explanation shown to the user.
    pub message: String,
    /// Signal that produced the factor.
    pub source: String,
}

/// Raw and capped deduction for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupImpact {
    /// Sum of the group's factor points.
    pub raw: u32,
    /// Points actually deducted (`min(raw, cap)`).
    pub capped: u32,
    /// The group's cap.
    pub cap: u32,
}

/// One itemized confidence penalty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReason {
    /// Why confidence was reduced.
    pub reason: String,
    /// Points removed from confidence.
    pub penalty: u32,
}

/// Coarse label for a score.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SafetyRating {
    /// Score below 20.
    Extreme,
    /// Score 20-39.
    High,
    /// Score 40-59.
    Elevated,
    /// Score 60-79.
    Caution,
    /// Score 80 and above.
    Favorable,
}

impl SafetyRating {
    /// Buckets a 0-100 score.
    #[must_use]
    pub const fn from_score(score: u8) -> Self {
        match score {
            0..=19 => Self::Extreme,
            20..=39 => Self::High,
            40..=59 => Self::Elevated,
            60..=79 => Self::Caution,
            _ => Self::Favorable,
        }
    }
}

/// Output of the safety score composer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyScoreResult {
    /// Composite score, 0 (most hazardous) to 100.
    pub score: u8,
    /// Trust in the score, 20 to 100.
    pub confidence: u8,
    /// Label for the score.
    pub rating: SafetyRating,
    /// Hazard of the single highest-impact factor, `"None"` without factors.
    pub primary_hazard: String,
    /// Every factor, in rule order.
    pub factors: Vec<HazardFactor>,
    /// Raw and capped deductions per group.
    pub group_impacts: BTreeMap<HazardGroup, GroupImpact>,
    /// Itemized confidence penalties.
    pub confidence_reasons: Vec<ConfidenceReason>,
}
