use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::badges::Badge;
use super::domain::{BadgeId, Hotel, HotelId, HotelScores, PoolCriteria};
use super::engine::ScoringWeight;

/// Storage abstraction for hotels and the pool criteria they own.
pub trait HotelRepository: Send + Sync {
    /// Identifiers of every hotel, or of the requested subset that exists.
    fn hotel_ids(&self, only: Option<&BTreeSet<HotelId>>) -> Result<Vec<HotelId>, RepositoryError>;
    fn fetch(&self, id: &HotelId) -> Result<Option<Hotel>, RepositoryError>;
    fn insert(&self, hotel: Hotel) -> Result<Hotel, RepositoryError>;
    fn pool_criteria(&self, id: &HotelId) -> Result<Option<PoolCriteria>, RepositoryError>;
    fn upsert_pool_criteria(
        &self,
        id: &HotelId,
        criteria: PoolCriteria,
    ) -> Result<(), RepositoryError>;
    /// Persist all four scores in a single write, but only while the stored
    /// criteria still equal `basis`. The comparison and the write must be
    /// atomic with respect to `upsert_pool_criteria`.
    fn update_scores(
        &self,
        id: &HotelId,
        scores: HotelScores,
        basis: &PoolCriteria,
        computed_at: DateTime<Utc>,
    ) -> Result<ScoreWrite, RepositoryError>;
    /// Replace the hotel's badge set.
    fn sync_badges(&self, id: &HotelId, badges: BTreeSet<BadgeId>) -> Result<(), RepositoryError>;
}

/// Outcome of a conditional score write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreWrite {
    Applied,
    /// The criteria changed after they were read; nothing was written.
    Stale,
}

/// Storage abstraction for scoring weight rows.
pub trait WeightRepository: Send + Sync {
    fn weights(&self) -> Result<Vec<ScoringWeight>, RepositoryError>;
    fn upsert_weight(&self, weight: ScoringWeight) -> Result<(), RepositoryError>;
}

/// Storage abstraction for badge definitions.
pub trait BadgeRepository: Send + Sync {
    fn badges(&self) -> Result<Vec<Badge>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record modified concurrently")]
    Modified,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
