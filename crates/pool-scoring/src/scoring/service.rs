use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use super::batch::{
    BadgeRunner, ProgressBoard, RecalculationRunner, RunError, RunId, RunKind,
    RunProgress, RunReport, RunTicket,
};
use super::domain::{CriteriaError, Hotel, HotelId, HotelScores, PoolCriteria, ScoreAxis};
use super::engine::{ScoreAggregator, ScoreBreakdown, ScoringWeight, WeightError, WeightTable};
use super::repository::{BadgeRepository, HotelRepository, RepositoryError, WeightRepository};
use crate::config::ScoringConfig;

/// Service composing the storage seams, the scoring engine and both runners.
pub struct ScoringService<H, W, B> {
    hotels: Arc<H>,
    weights: Arc<W>,
    board: Arc<ProgressBoard>,
    recalculation: RecalculationRunner<H, W>,
    badge_runner: BadgeRunner<H, B>,
    recompute_on_save: bool,
}

/// Result of a pool criteria write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CriteriaUpdate {
    pub hotel_id: HotelId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<HotelScores>,
}

impl<H, W, B> ScoringService<H, W, B>
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
    B: BadgeRepository + 'static,
{
    pub fn new(hotels: Arc<H>, weights: Arc<W>, badges: Arc<B>, config: &ScoringConfig) -> Self {
        let board = ProgressBoard::new();
        let recalculation = RecalculationRunner::new(
            hotels.clone(),
            weights.clone(),
            board.clone(),
            config.progress_interval,
        );
        let badge_runner =
            BadgeRunner::new(hotels.clone(), badges, board.clone(), config.progress_interval);

        Self {
            hotels,
            weights,
            board,
            recalculation,
            badge_runner,
            recompute_on_save: config.recompute_on_save,
        }
    }

    pub fn hotel(&self, hotel_id: &HotelId) -> Result<Hotel, ScoringServiceError> {
        let hotel = self
            .hotels
            .fetch(hotel_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(hotel)
    }

    /// Store new pool criteria. Scores are only recomputed here when
    /// `recompute_on_save` is enabled; otherwise they wait for an explicit
    /// recalculation.
    pub fn upsert_pool_criteria(
        &self,
        hotel_id: &HotelId,
        criteria: PoolCriteria,
    ) -> Result<CriteriaUpdate, ScoringServiceError> {
        criteria.validate()?;
        if self.hotels.fetch(hotel_id)?.is_none() {
            return Err(RepositoryError::NotFound.into());
        }
        self.hotels.upsert_pool_criteria(hotel_id, criteria)?;

        let scores = if self.recompute_on_save {
            self.recalculation.calculate_and_update_scores(hotel_id)?
        } else {
            None
        };

        Ok(CriteriaUpdate {
            hotel_id: hotel_id.clone(),
            scores,
        })
    }

    pub fn score_breakdown(
        &self,
        hotel_id: &HotelId,
    ) -> Result<Vec<ScoreBreakdown>, ScoringServiceError> {
        let criteria = self
            .hotels
            .pool_criteria(hotel_id)?
            .ok_or(RepositoryError::NotFound)?;
        let aggregator = ScoreAggregator::new(WeightTable::load(self.weights.as_ref())?);

        Ok(ScoreAxis::ALL
            .into_iter()
            .map(|axis| aggregator.breakdown(&criteria, axis))
            .collect())
    }

    pub fn calculate_and_update_scores(
        &self,
        hotel_id: &HotelId,
    ) -> Result<Option<HotelScores>, ScoringServiceError> {
        Ok(self.recalculation.calculate_and_update_scores(hotel_id)?)
    }

    pub fn recalculate_all_scores(&self) -> Result<RunReport, ScoringServiceError> {
        let ticket = self.recalculation.begin()?;
        self.execute_recalculation(ticket, None)
    }

    pub fn begin_recalculation(&self) -> Result<RunTicket, ScoringServiceError> {
        Ok(self.recalculation.begin()?)
    }

    pub fn execute_recalculation(
        &self,
        ticket: RunTicket,
        hotel_ids: Option<&BTreeSet<HotelId>>,
    ) -> Result<RunReport, ScoringServiceError> {
        Ok(self.recalculation.execute(ticket, hotel_ids)?)
    }

    pub fn begin_badge_application(&self) -> Result<RunTicket, ScoringServiceError> {
        Ok(self.badge_runner.begin()?)
    }

    pub fn execute_badge_application(
        &self,
        ticket: RunTicket,
        hotel_ids: Option<&BTreeSet<HotelId>>,
    ) -> Result<RunReport, ScoringServiceError> {
        Ok(self.badge_runner.execute(ticket, hotel_ids)?)
    }

    pub fn apply_badges(&self) -> Result<RunReport, ScoringServiceError> {
        let ticket = self.begin_badge_application()?;
        self.execute_badge_application(ticket, None)
    }

    /// Request cancellation of the claimed run of `kind`, whether it is still
    /// queued or already working. Returns whether a run was signalled.
    pub fn cancel(&self, kind: RunKind) -> bool {
        let signalled = self.board.cancel(kind);
        if signalled {
            info!(%kind, "cancellation requested");
        }
        signalled
    }

    pub fn progress(&self, kind: RunKind) -> Option<RunProgress> {
        self.board.latest(kind)
    }

    pub fn run_progress(&self, run_id: &RunId) -> Option<RunProgress> {
        self.board.run(run_id)
    }

    pub fn weights(&self) -> Result<Vec<ScoringWeight>, ScoringServiceError> {
        Ok(self.weights.weights()?)
    }

    /// Weight edits apply to the next run; an in-flight run keeps its snapshot.
    pub fn upsert_weight(&self, weight: ScoringWeight) -> Result<(), ScoringServiceError> {
        weight.validate()?;
        self.weights.upsert_weight(weight)?;
        Ok(())
    }
}

/// Error raised by the scoring service.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Criteria(#[from] CriteriaError),
    #[error(transparent)]
    Weight(#[from] WeightError),
    #[error(transparent)]
    Run(#[from] RunError),
}
