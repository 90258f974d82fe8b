use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CancellationToken, RunError};

/// Finished runs retained for lookup by run id.
const MAX_RUN_HISTORY: usize = 50;

/// Batch processes sharing the progress board. At most one run per kind may be
/// in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Recalculation,
    BadgeApplication,
}

impl RunKind {
    pub fn label(&self) -> &'static str {
        match self {
            RunKind::Recalculation => "recalculation",
            RunKind::BadgeApplication => "badge_application",
        }
    }

    pub fn from_key(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "recalculation" | "scores" => Some(RunKind::Recalculation),
            "badge_application" | "badges" => Some(RunKind::BadgeApplication),
            _ => None,
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

/// Coarse progress snapshot published at checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    pub run_id: RunId,
    pub kind: RunKind,
    pub status: RunStatus,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunProgress {
    fn pending(kind: RunKind) -> Self {
        let now = Utc::now();
        Self {
            run_id: RunId::generate(),
            kind,
            status: RunStatus::Pending,
            total: 0,
            processed: 0,
            skipped: 0,
            errors: 0,
            message: None,
            started_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Hotels visited so far, whatever their outcome.
    pub fn considered(&self) -> usize {
        self.processed + self.skipped + self.errors
    }
}

/// Final tally returned to the caller of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub kind: RunKind,
    pub status: RunStatus,
    pub total: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl From<&RunProgress> for RunReport {
    fn from(progress: &RunProgress) -> Self {
        Self {
            run_id: progress.run_id,
            kind: progress.kind,
            status: progress.status,
            total: progress.total,
            processed: progress.processed,
            skipped: progress.skipped,
            errors: progress.errors,
            started_at: progress.started_at,
            finished_at: progress.finished_at.unwrap_or(progress.updated_at),
        }
    }
}

#[derive(Debug, Default)]
struct BoardState {
    latest: HashMap<RunKind, RunProgress>,
    runs: HashMap<RunId, RunProgress>,
    order: VecDeque<RunId>,
    in_flight: HashSet<RunKind>,
    cancellations: HashMap<RunKind, CancellationToken>,
}

impl BoardState {
    fn publish(&mut self, progress: &RunProgress) {
        self.latest.insert(progress.kind, progress.clone());
        if self.runs.insert(progress.run_id, progress.clone()).is_none() {
            self.order.push_back(progress.run_id);
            while self.order.len() > MAX_RUN_HISTORY {
                if let Some(evicted) = self.order.pop_front() {
                    self.runs.remove(&evicted);
                }
            }
        }
    }
}

/// Shared progress slots keyed by run kind, plus per-run history keyed by run
/// id. Also acts as the named lock keeping one in-flight run per kind, and
/// owns each claimed run's cancellation token until the claim is released.
#[derive(Debug, Default)]
pub struct ProgressBoard {
    state: Mutex<BoardState>,
}

impl ProgressBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the lock for `kind`. A second claim while the first ticket is
    /// alive fails without touching the published slot. The run is
    /// cancellable from the moment the claim succeeds.
    pub fn begin(
        self: &Arc<Self>,
        kind: RunKind,
        checkpoint_every: usize,
    ) -> Result<RunTicket, RunError> {
        let mut state = self.state();
        if !state.in_flight.insert(kind) {
            return Err(RunError::AlreadyRunning(kind));
        }

        let progress = RunProgress::pending(kind);
        state.publish(&progress);
        let cancellation = CancellationToken::new();
        state.cancellations.insert(kind, cancellation.clone());

        Ok(RunTicket {
            board: Arc::clone(self),
            progress,
            cancellation,
            checkpoint_every: checkpoint_every.max(1),
            finished: false,
        })
    }

    pub fn latest(&self, kind: RunKind) -> Option<RunProgress> {
        self.state().latest.get(&kind).cloned()
    }

    pub fn run(&self, run_id: &RunId) -> Option<RunProgress> {
        self.state().runs.get(run_id).cloned()
    }

    pub fn is_running(&self, kind: RunKind) -> bool {
        self.state().in_flight.contains(&kind)
    }

    /// Signal the claimed run of `kind`. Returns false when nothing holds the
    /// claim.
    pub fn cancel(&self, kind: RunKind) -> bool {
        match self.state().cancellations.get(&kind) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn publish(&self, progress: &RunProgress) {
        self.state().publish(progress);
    }

    /// Publish a terminal snapshot and release the claim in one step.
    fn settle(&self, progress: &RunProgress) {
        let mut state = self.state();
        state.publish(progress);
        state.in_flight.remove(&progress.kind);
        state.cancellations.remove(&progress.kind);
    }
}

/// Outcome of one hotel inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotelOutcome {
    Processed,
    Skipped,
    Failed,
}

/// Exclusive handle on a run. The lock is released when the run reaches a
/// terminal status; dropping an unfinished ticket marks the run failed.
#[derive(Debug)]
pub struct RunTicket {
    board: Arc<ProgressBoard>,
    progress: RunProgress,
    cancellation: CancellationToken,
    checkpoint_every: usize,
    finished: bool,
}

impl RunTicket {
    pub fn run_id(&self) -> RunId {
        self.progress.run_id
    }

    pub fn kind(&self) -> RunKind {
        self.progress.kind
    }

    pub fn progress(&self) -> &RunProgress {
        &self.progress
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn start(&mut self, total: usize) {
        self.progress.status = RunStatus::Processing;
        self.progress.total = total;
        self.touch();
    }

    /// Count one hotel; publishes every `checkpoint_every` hotels. Returns
    /// whether a checkpoint was published.
    pub fn record(&mut self, outcome: HotelOutcome) -> bool {
        match outcome {
            HotelOutcome::Processed => self.progress.processed += 1,
            HotelOutcome::Skipped => self.progress.skipped += 1,
            HotelOutcome::Failed => self.progress.errors += 1,
        }

        if self.progress.considered() % self.checkpoint_every == 0 {
            self.touch();
            true
        } else {
            false
        }
    }

    pub fn complete(self) -> RunReport {
        self.finish(RunStatus::Completed, None)
    }

    pub fn cancel(self) -> RunReport {
        self.finish(RunStatus::Cancelled, Some("run cancelled".to_string()))
    }

    pub fn fail(self, message: impl Into<String>) -> RunReport {
        self.finish(RunStatus::Failed, Some(message.into()))
    }

    fn finish(mut self, status: RunStatus, message: Option<String>) -> RunReport {
        self.close(status, message);
        RunReport::from(&self.progress)
    }

    fn close(&mut self, status: RunStatus, message: Option<String>) {
        let now = Utc::now();
        self.progress.status = status;
        self.progress.message = message;
        self.progress.updated_at = now;
        self.progress.finished_at = Some(now);
        self.board.settle(&self.progress);
        self.finished = true;
    }

    fn touch(&mut self) {
        self.progress.updated_at = Utc::now();
        self.board.publish(&self.progress);
    }
}

impl Drop for RunTicket {
    fn drop(&mut self) {
        if !self.finished {
            self.close(
                RunStatus::Failed,
                Some("run aborted before completion".to_string()),
            );
        }
    }
}
