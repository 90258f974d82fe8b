use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::progress::{HotelOutcome, ProgressBoard, RunKind, RunReport, RunTicket};
use super::RunError;
use crate::scoring::domain::{HotelId, HotelScores};
use crate::scoring::engine::{ScoreAggregator, WeightTable};
use crate::scoring::repository::{
    HotelRepository, RepositoryError, ScoreWrite, WeightRepository,
};

/// Score writes attempted for one hotel while its criteria keep changing.
const MAX_SCORE_ATTEMPTS: usize = 3;

/// Recomputes and persists hotel scores, one hotel at a time.
pub struct RecalculationRunner<H, W> {
    hotels: Arc<H>,
    weights: Arc<W>,
    board: Arc<ProgressBoard>,
    checkpoint_every: usize,
}

impl<H, W> RecalculationRunner<H, W>
where
    H: HotelRepository + 'static,
    W: WeightRepository + 'static,
{
    pub fn new(
        hotels: Arc<H>,
        weights: Arc<W>,
        board: Arc<ProgressBoard>,
        checkpoint_every: usize,
    ) -> Self {
        Self {
            hotels,
            weights,
            board,
            checkpoint_every,
        }
    }

    pub fn board(&self) -> &Arc<ProgressBoard> {
        &self.board
    }

    /// Claim the recalculation lock without starting work, so callers can
    /// hand out the run id before executing on a worker.
    pub fn begin(&self) -> Result<RunTicket, RunError> {
        self.board.begin(RunKind::Recalculation, self.checkpoint_every)
    }

    /// Score every hotel (`None`) or the given subset.
    pub fn run(&self, hotel_ids: Option<&BTreeSet<HotelId>>) -> Result<RunReport, RunError> {
        let ticket = self.begin()?;
        self.execute(ticket, hotel_ids)
    }

    pub fn recalculate_all_scores(&self) -> Result<RunReport, RunError> {
        self.run(None)
    }

    /// Work a claimed run to the end, stopping between hotels once the
    /// ticket's cancellation token is set.
    pub fn execute(
        &self,
        mut ticket: RunTicket,
        hotel_ids: Option<&BTreeSet<HotelId>>,
    ) -> Result<RunReport, RunError> {
        let run_id = ticket.run_id();
        if ticket.is_cancelled() {
            info!(%run_id, "score recalculation cancelled before it started");
            return Ok(ticket.cancel());
        }

        let weights = match WeightTable::load(self.weights.as_ref()) {
            Ok(weights) => weights,
            Err(err) => {
                error!(%run_id, error = %err, "score recalculation failed to load weights");
                ticket.fail(format!("failed to load scoring weights: {err}"));
                return Err(RunError::Weights(err));
            }
        };
        let aggregator = ScoreAggregator::new(weights);

        let ids = match self.hotels.hotel_ids(hotel_ids) {
            Ok(ids) => ids,
            Err(err) => {
                error!(%run_id, error = %err, "score recalculation failed to enumerate hotels");
                ticket.fail(format!("failed to enumerate hotels: {err}"));
                return Err(RunError::Enumerate(err));
            }
        };

        info!(%run_id, total = ids.len(), "score recalculation started");
        ticket.start(ids.len());

        for hotel_id in &ids {
            if ticket.is_cancelled() {
                let report = ticket.cancel();
                info!(%run_id, processed = report.processed, "score recalculation cancelled");
                return Ok(report);
            }

            let outcome = match self.score_hotel(&aggregator, hotel_id) {
                Ok(Some(_)) => HotelOutcome::Processed,
                Ok(None) => {
                    debug!(%hotel_id, "hotel has no pool criteria, skipping");
                    HotelOutcome::Skipped
                }
                Err(err) => {
                    warn!(%run_id, %hotel_id, error = %err, "failed to recalculate hotel scores");
                    HotelOutcome::Failed
                }
            };

            if ticket.record(outcome) {
                let progress = ticket.progress();
                debug!(
                    %run_id,
                    processed = progress.processed,
                    errors = progress.errors,
                    total = progress.total,
                    "score recalculation checkpoint"
                );
            }
        }

        let report = ticket.complete();
        info!(
            %run_id,
            processed = report.processed,
            skipped = report.skipped,
            errors = report.errors,
            "score recalculation completed"
        );
        Ok(report)
    }

    /// Recompute one hotel against freshly loaded weights. `Ok(None)` when the
    /// hotel has no pool criteria.
    pub fn calculate_and_update_scores(
        &self,
        hotel_id: &HotelId,
    ) -> Result<Option<HotelScores>, RepositoryError> {
        if self.hotels.fetch(hotel_id)?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        let aggregator = ScoreAggregator::new(WeightTable::load(self.weights.as_ref())?);
        self.score_hotel(&aggregator, hotel_id)
    }

    /// Scores are only written against the criteria they were computed from;
    /// a concurrent criteria save forces a re-read.
    fn score_hotel(
        &self,
        aggregator: &ScoreAggregator,
        hotel_id: &HotelId,
    ) -> Result<Option<HotelScores>, RepositoryError> {
        for attempt in 1..=MAX_SCORE_ATTEMPTS {
            let Some(criteria) = self.hotels.pool_criteria(hotel_id)? else {
                return Ok(None);
            };

            let scores = aggregator.score_all(&criteria);
            match self
                .hotels
                .update_scores(hotel_id, scores, &criteria, Utc::now())?
            {
                ScoreWrite::Applied => return Ok(Some(scores)),
                ScoreWrite::Stale => {
                    debug!(%hotel_id, attempt, "pool criteria changed while scoring, re-reading");
                }
            }
        }
        Err(RepositoryError::Modified)
    }
}
