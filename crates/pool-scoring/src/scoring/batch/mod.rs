//! Sequential batch runners sharing the progress board and partial-failure
//! semantics: a failing hotel is logged and counted, never fatal to the run.

mod badge_run;
pub mod progress;
mod recalculation;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use badge_run::BadgeRunner;
pub use progress::{
    HotelOutcome, ProgressBoard, RunId, RunKind, RunProgress, RunReport, RunStatus, RunTicket,
};
pub use recalculation::RecalculationRunner;

use super::repository::RepositoryError;

/// Cooperative cancellation flag checked between hotels.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Run-level failures. Per-hotel failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("a {0} run is already in progress")]
    AlreadyRunning(RunKind),
    #[error("failed to load scoring weights: {0}")]
    Weights(#[source] RepositoryError),
    #[error("failed to load badge definitions: {0}")]
    Badges(#[source] RepositoryError),
    #[error("failed to enumerate hotels: {0}")]
    Enumerate(#[source] RepositoryError),
}
