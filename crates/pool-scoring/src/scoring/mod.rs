//! Pool and sunbed scoring: domain model, the weighted scoring engine, the
//! batch runners that persist scores and badges, and the HTTP surface over
//! them.

pub mod badges;
pub mod batch;
pub mod domain;
pub mod engine;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use badges::{Badge, BadgeField, BadgeRule, RuleOperator};
pub use batch::{
    BadgeRunner, CancellationToken, ProgressBoard, RecalculationRunner, RunError, RunId, RunKind,
    RunProgress, RunReport, RunStatus,
};
pub use domain::{
    Atmosphere, BadgeId, CriteriaError, Hotel, HotelId, HotelScores, PoolCriteria, ScoreAxis,
    SunExposure,
};
pub use engine::{
    Criterion, ScoreAggregator, ScoreBreakdown, ScoringWeight, WeightError, WeightSeedImporter,
    WeightTable,
};
pub use repository::{
    BadgeRepository, HotelRepository, RepositoryError, ScoreWrite, WeightRepository,
};
pub use router::scoring_router;
pub use service::{CriteriaUpdate, ScoringService, ScoringServiceError};
