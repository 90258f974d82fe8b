use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::progress::{HotelOutcome, ProgressBoard, RunKind, RunReport, RunTicket};
use super::RunError;
use crate::scoring::badges::Badge;
use crate::scoring::domain::{BadgeId, HotelId};
use crate::scoring::repository::{BadgeRepository, HotelRepository, RepositoryError};

/// Matches active badges against each hotel and syncs the hotel's badge set.
pub struct BadgeRunner<H, B> {
    hotels: Arc<H>,
    badges: Arc<B>,
    board: Arc<ProgressBoard>,
    checkpoint_every: usize,
}

impl<H, B> BadgeRunner<H, B>
where
    H: HotelRepository + 'static,
    B: BadgeRepository + 'static,
{
    pub fn new(
        hotels: Arc<H>,
        badges: Arc<B>,
        board: Arc<ProgressBoard>,
        checkpoint_every: usize,
    ) -> Self {
        Self {
            hotels,
            badges,
            board,
            checkpoint_every,
        }
    }

    pub fn begin(&self) -> Result<RunTicket, RunError> {
        self.board
            .begin(RunKind::BadgeApplication, self.checkpoint_every)
    }

    pub fn run(&self, hotel_ids: Option<&BTreeSet<HotelId>>) -> Result<RunReport, RunError> {
        let ticket = self.begin()?;
        self.execute(ticket, hotel_ids)
    }

    pub fn execute(
        &self,
        mut ticket: RunTicket,
        hotel_ids: Option<&BTreeSet<HotelId>>,
    ) -> Result<RunReport, RunError> {
        let run_id = ticket.run_id();
        if ticket.is_cancelled() {
            info!(%run_id, "badge application cancelled before it started");
            return Ok(ticket.cancel());
        }

        let badges: Vec<Badge> = match self.badges.badges() {
            Ok(badges) => badges.into_iter().filter(|badge| badge.is_active).collect(),
            Err(err) => {
                error!(%run_id, error = %err, "badge application failed to load badges");
                ticket.fail(format!("failed to load badge definitions: {err}"));
                return Err(RunError::Badges(err));
            }
        };

        let ids = match self.hotels.hotel_ids(hotel_ids) {
            Ok(ids) => ids,
            Err(err) => {
                error!(%run_id, error = %err, "badge application failed to enumerate hotels");
                ticket.fail(format!("failed to enumerate hotels: {err}"));
                return Err(RunError::Enumerate(err));
            }
        };

        info!(%run_id, total = ids.len(), badges = badges.len(), "badge application started");
        ticket.start(ids.len());

        for hotel_id in &ids {
            if ticket.is_cancelled() {
                let report = ticket.cancel();
                info!(%run_id, processed = report.processed, "badge application cancelled");
                return Ok(report);
            }

            let outcome = match self.apply_badges(&badges, hotel_id) {
                Ok(Some(assigned)) => {
                    debug!(%hotel_id, assigned = assigned.len(), "badges synced");
                    HotelOutcome::Processed
                }
                Ok(None) => HotelOutcome::Skipped,
                Err(err) => {
                    warn!(%run_id, %hotel_id, error = %err, "failed to apply badges");
                    HotelOutcome::Failed
                }
            };
            ticket.record(outcome);
        }

        let report = ticket.complete();
        info!(
            %run_id,
            processed = report.processed,
            errors = report.errors,
            "badge application completed"
        );
        Ok(report)
    }

    /// `Ok(None)` when the hotel vanished between enumeration and processing.
    fn apply_badges(
        &self,
        badges: &[Badge],
        hotel_id: &HotelId,
    ) -> Result<Option<BTreeSet<BadgeId>>, RepositoryError> {
        let Some(hotel) = self.hotels.fetch(hotel_id)? else {
            return Ok(None);
        };
        let criteria = self.hotels.pool_criteria(hotel_id)?;

        let assigned: BTreeSet<BadgeId> = badges
            .iter()
            .filter(|badge| badge.matches(&hotel, criteria.as_ref()))
            .map(|badge| badge.id.clone())
            .collect();

        self.hotels.sync_badges(hotel_id, assigned.clone())?;
        Ok(Some(assigned))
    }
}
