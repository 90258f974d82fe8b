use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for hotels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HotelId(pub String);

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for badges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BadgeId(pub String);

/// How much direct sun the pool deck receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SunExposure {
    AllDay,
    Morning,
    Afternoon,
    Limited,
    #[serde(other)]
    Other,
}

impl SunExposure {
    pub fn label(&self) -> &'static str {
        match self {
            SunExposure::AllDay => "all_day",
            SunExposure::Morning => "morning",
            SunExposure::Afternoon => "afternoon",
            SunExposure::Limited => "limited",
            SunExposure::Other => "other",
        }
    }
}

/// Prevailing mood around the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Atmosphere {
    Quiet,
    Lively,
    Family,
    Party,
    Mixed,
    #[serde(other)]
    Other,
}

impl Atmosphere {
    pub fn label(&self) -> &'static str {
        match self {
            Atmosphere::Quiet => "quiet",
            Atmosphere::Lively => "lively",
            Atmosphere::Family => "family",
            Atmosphere::Party => "party",
            Atmosphere::Mixed => "mixed",
            Atmosphere::Other => "other",
        }
    }
}

/// Hotelier/admin entered facts about a hotel's pool and sunbed offering.
///
/// Every field is optional on the wire; absent flags are `false` and absent
/// ratings fall back to the neutral defaults applied by the sub-score
/// calculators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolCriteria {
    pub sunbed_to_guest_ratio: Option<f64>,
    pub sun_exposure: Option<SunExposure>,
    pub sun_hours: Option<u8>,
    pub number_of_pools: u32,
    pub has_infinity_pool: bool,
    pub has_rooftop_pool: bool,
    pub has_heated_pool: bool,
    pub has_kids_pool: bool,
    pub has_lazy_river: bool,
    pub has_pool_bar: bool,
    pub has_swim_up_bar: bool,
    pub has_lifeguard: bool,
    pub has_kids_activities: bool,
    pub has_pool_toys: bool,
    pub has_changing_facilities: bool,
    pub has_towel_service: bool,
    pub has_cabanas: bool,
    pub has_shade_areas: bool,
    pub has_water_slides: bool,
    pub is_adults_only: bool,
    pub atmosphere: Option<Atmosphere>,
    pub cleanliness_score: Option<u8>,
    pub maintenance_score: Option<u8>,
}

impl PoolCriteria {
    /// Ratings are 1-5 when present.
    pub fn validate(&self) -> Result<(), CriteriaError> {
        for (field, value) in [
            ("cleanliness_score", self.cleanliness_score),
            ("maintenance_score", self.maintenance_score),
        ] {
            if let Some(value) = value {
                if !(1..=5).contains(&value) {
                    return Err(CriteriaError::RatingOutOfRange { field, value });
                }
            }
        }

        if let Some(ratio) = self.sunbed_to_guest_ratio {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(CriteriaError::InvalidRatio(ratio));
            }
        }

        Ok(())
    }
}

/// Rejected pool criteria writes.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("{field} must be between 1 and 5 (found {value})")]
    RatingOutOfRange { field: &'static str, value: u8 },
    #[error("sunbed_to_guest_ratio must be a non-negative number (found {0})")]
    InvalidRatio(f64),
}

/// One of the four published scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreAxis {
    Overall,
    Family,
    Quiet,
    Party,
}

impl ScoreAxis {
    pub const ALL: [ScoreAxis; 4] = [
        ScoreAxis::Overall,
        ScoreAxis::Family,
        ScoreAxis::Quiet,
        ScoreAxis::Party,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ScoreAxis::Overall => "overall",
            ScoreAxis::Family => "family",
            ScoreAxis::Quiet => "quiet",
            ScoreAxis::Party => "party",
        }
    }
}

/// The four published scores, each in `0.0..=10.0` with one decimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HotelScores {
    pub overall_score: f64,
    pub family_score: f64,
    pub quiet_score: f64,
    pub party_score: f64,
}

impl HotelScores {
    pub fn get(&self, axis: ScoreAxis) -> f64 {
        match axis {
            ScoreAxis::Overall => self.overall_score,
            ScoreAxis::Family => self.family_score,
            ScoreAxis::Quiet => self.quiet_score,
            ScoreAxis::Party => self.party_score,
        }
    }
}

/// Hotel row as seen by the scoring engine. Scores are cached on the row so
/// listings can sort and filter without recomputing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: HotelId,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub family_score: Option<f64>,
    #[serde(default)]
    pub quiet_score: Option<f64>,
    #[serde(default)]
    pub party_score: Option<f64>,
    #[serde(default)]
    pub scores_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub badges: BTreeSet<BadgeId>,
}

impl Hotel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: HotelId(id.into()),
            name: name.into(),
            city: None,
            overall_score: None,
            family_score: None,
            quiet_score: None,
            party_score: None,
            scores_updated_at: None,
            badges: BTreeSet::new(),
        }
    }

    pub fn scores(&self) -> Option<HotelScores> {
        Some(HotelScores {
            overall_score: self.overall_score?,
            family_score: self.family_score?,
            quiet_score: self.quiet_score?,
            party_score: self.party_score?,
        })
    }

    /// Write all four scores at once.
    pub fn apply_scores(&mut self, scores: HotelScores, at: DateTime<Utc>) {
        self.overall_score = Some(scores.overall_score);
        self.family_score = Some(scores.family_score);
        self.quiet_score = Some(scores.quiet_score);
        self.party_score = Some(scores.party_score);
        self.scores_updated_at = Some(at);
    }
}
