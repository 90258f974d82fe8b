use serde::{Deserialize, Serialize};

use super::subscores::{
    score_atmosphere, score_cleanliness, score_family_features, score_pool_variety,
    score_sun_exposure, score_sunbed_ratio, MAX_SUBSCORE,
};
use super::weights::{Criterion, WeightTable};
use crate::scoring::domain::{Atmosphere, PoolCriteria, ScoreAxis};

pub const MAX_SCORE: f64 = 10.0;

/// Tolerance absorbing binary representation error at `x.x5` boundaries.
const ROUNDING_EPSILON: f64 = 1e-9;

/// One weighted criterion inside a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub criterion: Criterion,
    pub subscore: f64,
    pub weight: f64,
}

impl ScoreComponent {
    pub fn contribution(&self) -> f64 {
        self.subscore * self.weight
    }
}

/// Axis-specific bonus terms added after the six criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisBonus {
    QuietSetting,
    PartyAtmosphere,
    PoolBar,
}

impl AxisBonus {
    /// `(score, weight)` added to the running totals.
    pub fn terms(&self) -> (f64, f64) {
        match self {
            AxisBonus::QuietSetting => (2.0, 0.5),
            AxisBonus::PartyAtmosphere => (2.0, 0.5),
            AxisBonus::PoolBar => (1.0, 0.3),
        }
    }

    fn applicable(axis: ScoreAxis, criteria: &PoolCriteria) -> Vec<AxisBonus> {
        let mut bonuses = Vec::new();
        match axis {
            ScoreAxis::Quiet => {
                if criteria.atmosphere == Some(Atmosphere::Quiet) || criteria.is_adults_only {
                    bonuses.push(AxisBonus::QuietSetting);
                }
            }
            ScoreAxis::Party => {
                if matches!(
                    criteria.atmosphere,
                    Some(Atmosphere::Party) | Some(Atmosphere::Lively)
                ) {
                    bonuses.push(AxisBonus::PartyAtmosphere);
                }
                if criteria.has_pool_bar {
                    bonuses.push(AxisBonus::PoolBar);
                }
            }
            ScoreAxis::Overall | ScoreAxis::Family => {}
        }
        bonuses
    }
}

/// Auditable trail of how one axis score was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub axis: ScoreAxis,
    pub components: Vec<ScoreComponent>,
    pub bonuses: Vec<AxisBonus>,
    pub total_score: f64,
    pub total_weight: f64,
    pub weighted_average: f64,
    pub score: f64,
}

pub fn subscore(criterion: Criterion, criteria: &PoolCriteria) -> f64 {
    match criterion {
        Criterion::SunbedRatio => score_sunbed_ratio(criteria.sunbed_to_guest_ratio),
        Criterion::SunExposure => score_sun_exposure(criteria.sun_exposure, criteria.sun_hours),
        Criterion::PoolVariety => score_pool_variety(criteria),
        Criterion::Atmosphere => score_atmosphere(criteria.atmosphere),
        Criterion::Cleanliness => {
            score_cleanliness(criteria.cleanliness_score, criteria.maintenance_score)
        }
        Criterion::FamilyFeatures => score_family_features(criteria),
    }
}

pub(crate) fn breakdown(
    criteria: &PoolCriteria,
    weights: &WeightTable,
    axis: ScoreAxis,
) -> ScoreBreakdown {
    let mut total_score = 0.0;
    let mut total_weight = 0.0;

    let components: Vec<ScoreComponent> = Criterion::ALL
        .into_iter()
        .map(|criterion| ScoreComponent {
            criterion,
            subscore: subscore(criterion, criteria),
            weight: weights.weight_for(criterion, axis),
        })
        .collect();

    for component in &components {
        total_score += component.contribution();
        total_weight += component.weight;
    }

    let bonuses = AxisBonus::applicable(axis, criteria);
    for bonus in &bonuses {
        let (score, weight) = bonus.terms();
        total_score += score;
        total_weight += weight;
    }

    let weighted_average = if total_weight > 0.0 {
        total_score / total_weight
    } else {
        0.0
    };

    ScoreBreakdown {
        axis,
        components,
        bonuses,
        total_score,
        total_weight,
        weighted_average,
        score: publish(weighted_average),
    }
}

/// Rescale a 0-5 weighted average to the published 0-10 range.
fn publish(weighted_average: f64) -> f64 {
    let scaled = weighted_average * (MAX_SCORE / MAX_SUBSCORE);
    round_score(scaled).clamp(0.0, MAX_SCORE)
}

/// Round half-up to one decimal place.
pub fn round_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    ((value * 10.0) + ROUNDING_EPSILON).round() / 10.0
}
