mod aggregate;
pub mod subscores;
mod weights;

pub use aggregate::{round_score, subscore, AxisBonus, ScoreBreakdown, ScoreComponent, MAX_SCORE};
pub use weights::{
    Criterion, ScoringWeight, WeightError, WeightSeedImporter, WeightTable, DEFAULT_WEIGHT,
};

use super::domain::{HotelScores, PoolCriteria, ScoreAxis};

/// Stateless aggregator applying one weight snapshot to pool criteria.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    weights: WeightTable,
}

impl ScoreAggregator {
    pub fn new(weights: WeightTable) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    pub fn score(&self, criteria: &PoolCriteria, axis: ScoreAxis) -> f64 {
        self.breakdown(criteria, axis).score
    }

    pub fn breakdown(&self, criteria: &PoolCriteria, axis: ScoreAxis) -> ScoreBreakdown {
        aggregate::breakdown(criteria, &self.weights, axis)
    }

    pub fn score_all(&self, criteria: &PoolCriteria) -> HotelScores {
        HotelScores {
            overall_score: self.score(criteria, ScoreAxis::Overall),
            family_score: self.score(criteria, ScoreAxis::Family),
            quiet_score: self.score(criteria, ScoreAxis::Quiet),
            party_score: self.score(criteria, ScoreAxis::Party),
        }
    }
}
