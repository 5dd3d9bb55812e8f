//! Types for the run controller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::delivery::DeliveryError;
use crate::processor::CaseState;
use crate::queue::QueueError;

/// Errors that end a run early.
#[derive(Debug, Error)]
pub enum RunError {
    /// The delivery endpoint failed the reachability probe; nothing was processed.
    #[error("delivery endpoint unreachable, run not started: {0}")]
    DeliveryUnreachable(#[source] DeliveryError),

    /// The pending list could not be read.
    #[error("queue store error: {0}")]
    Store(#[from] QueueError),

    /// Too many document fetches failed; the run stopped at the offending case file.
    #[error("error budget exceeded after {} case files", .0.processed())]
    BudgetExceeded(RunSummary),
}

/// Counters of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Pending identifiers at the start of the run.
    pub total: usize,
    /// Delivered and marked completed.
    pub completed: usize,
    pub incomplete: usize,
    pub rejected: usize,
    /// Listing, packaging, cleanup or delivery failures.
    pub failed: usize,
    /// Stopped by the error budget.
    pub aborted: bool,
    /// Document fetch failures charged to the budget.
    pub document_failures: usize,
}

impl RunSummary {
    pub(crate) fn new(run_id: String) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            total: 0,
            completed: 0,
            incomplete: 0,
            rejected: 0,
            failed: 0,
            aborted: false,
            document_failures: 0,
        }
    }

    /// Case files that reached a terminal state.
    pub fn processed(&self) -> usize {
        self.completed + self.incomplete + self.rejected + self.failed
    }

    /// Every pending case file was delivered.
    pub fn is_clean(&self) -> bool {
        !self.aborted && self.completed == self.total
    }
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone)]
pub enum RunProgress {
    Started { total: usize },
    CaseStarted { index: usize, case_file: String },
    CaseFinished {
        index: usize,
        case_file: String,
        state: CaseState,
        delivered: bool,
    },
}

/// Callback invoked with run progress.
pub type RunProgressCallback = Arc<dyn Fn(RunProgress) + Send + Sync>;
