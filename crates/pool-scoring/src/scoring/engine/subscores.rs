//! Sub-score calculators. Each maps one facet of [`PoolCriteria`] to `0.0..=5.0`
//! and defines a neutral value for missing input.

use crate::scoring::domain::{Atmosphere, PoolCriteria, SunExposure};

pub const MAX_SUBSCORE: f64 = 5.0;
pub const NEUTRAL_SUBSCORE: f64 = 2.5;
const DEFAULT_RATING: u8 = 3;

/// Thresholds are inclusive and checked from the top.
const SUNBED_RATIO_STEPS: [(f64, f64); 5] = [
    (1.0, 5.0),
    (0.75, 4.5),
    (0.5, 3.5),
    (0.33, 2.5),
    (0.25, 1.5),
];
const SUNBED_RATIO_FLOOR: f64 = 0.5;

pub fn score_sunbed_ratio(ratio: Option<f64>) -> f64 {
    let Some(ratio) = ratio else {
        return NEUTRAL_SUBSCORE;
    };

    SUNBED_RATIO_STEPS
        .iter()
        .find(|(threshold, _)| ratio >= *threshold)
        .map(|(_, score)| *score)
        .unwrap_or(SUNBED_RATIO_FLOOR)
}

/// `_hours` is accepted for callers that record sun hours; the score only
/// depends on the exposure category.
pub fn score_sun_exposure(exposure: Option<SunExposure>, _hours: Option<u8>) -> f64 {
    match exposure {
        None => NEUTRAL_SUBSCORE,
        Some(SunExposure::AllDay) => 5.0,
        Some(SunExposure::Afternoon) => 4.0,
        Some(SunExposure::Morning) => 3.5,
        Some(SunExposure::Limited) => 2.0,
        Some(SunExposure::Other) => NEUTRAL_SUBSCORE,
    }
}

pub fn score_pool_variety(criteria: &PoolCriteria) -> f64 {
    let mut score = 2.0 + (criteria.number_of_pools as f64 * 0.5).min(2.0);

    if criteria.has_infinity_pool {
        score += 0.5;
    }
    if criteria.has_rooftop_pool {
        score += 0.5;
    }
    if criteria.has_heated_pool {
        score += 0.3;
    }
    if criteria.has_kids_pool {
        score += 0.3;
    }
    if criteria.has_lazy_river {
        score += 0.4;
    }

    score.min(MAX_SUBSCORE)
}

pub fn score_atmosphere(atmosphere: Option<Atmosphere>) -> f64 {
    match atmosphere {
        None => NEUTRAL_SUBSCORE,
        Some(Atmosphere::Quiet) | Some(Atmosphere::Family) => 4.5,
        Some(Atmosphere::Lively) => 4.0,
        Some(Atmosphere::Party) | Some(Atmosphere::Mixed) => 3.5,
        Some(Atmosphere::Other) => NEUTRAL_SUBSCORE,
    }
}

/// Each missing rating counts as 3 before averaging.
pub fn score_cleanliness(cleanliness: Option<u8>, maintenance: Option<u8>) -> f64 {
    let cleanliness = cleanliness.unwrap_or(DEFAULT_RATING) as f64;
    let maintenance = maintenance.unwrap_or(DEFAULT_RATING) as f64;
    ((cleanliness + maintenance) / 2.0).clamp(0.0, MAX_SUBSCORE)
}

pub fn score_family_features(criteria: &PoolCriteria) -> f64 {
    let mut score: f64 = 2.0;

    if criteria.has_kids_pool {
        score += 1.0;
    }
    if criteria.has_kids_activities {
        score += 0.8;
    }
    if criteria.has_lifeguard {
        score += 0.7;
    }
    if criteria.has_pool_toys {
        score += 0.3;
    }
    if criteria.has_changing_facilities {
        score += 0.2;
    }

    score.min(MAX_SUBSCORE)
}
