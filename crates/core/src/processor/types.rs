//! Types for the processor module.

use serde::Serialize;
use std::fmt;

use crate::fetcher::FetchReport;
use crate::packager::{Completeness, PackagedArchive};

/// Processing state of a case file.
///
/// The happy path is `Validating → Fetching → Complete → Packaging →
/// Packaged → CleanedUp`. Every other terminal state leaves the identifier
/// pending in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Validating,
    Fetching,
    /// Some listed documents are still missing; the workspace is kept.
    Incomplete,
    Complete,
    Packaging,
    Packaged,
    /// Archive written and workspace removed; ready for delivery.
    CleanedUp,
    /// The identifier does not match the case-file grammar.
    Rejected,
    /// The run's error budget was exceeded during this case file.
    FetchAborted,
    PackagingFailed,
    /// The document listing failed or came back empty.
    ListingFailed,
    /// The workspace directory could not be created.
    WorkspaceFailed,
    /// The archive exists but the workspace could not be removed.
    CleanupFailed,
}

impl CaseState {
    /// Whether processing stops in this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            CaseState::Validating
                | CaseState::Fetching
                | CaseState::Complete
                | CaseState::Packaging
                | CaseState::Packaged
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseState::Validating => "validating",
            CaseState::Fetching => "fetching",
            CaseState::Incomplete => "incomplete",
            CaseState::Complete => "complete",
            CaseState::Packaging => "packaging",
            CaseState::Packaged => "packaged",
            CaseState::CleanedUp => "cleaned_up",
            CaseState::Rejected => "rejected",
            CaseState::FetchAborted => "fetch_aborted",
            CaseState::PackagingFailed => "packaging_failed",
            CaseState::ListingFailed => "listing_failed",
            CaseState::WorkspaceFailed => "workspace_failed",
            CaseState::CleanupFailed => "cleanup_failed",
        }
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of processing one case file.
#[derive(Debug)]
pub struct CaseReport {
    /// Identifier as read from the queue (may be malformed when rejected).
    pub case_file: String,
    pub state: CaseState,
    /// Human-readable reason for a non-successful state.
    pub cause: Option<String>,
    /// Fetch stage report, when fetching ran.
    pub fetch: Option<FetchReport>,
    /// Document presence after fetching.
    pub completeness: Option<Completeness>,
    /// The written archive, from `Packaged` on.
    pub archive: Option<PackagedArchive>,
}

impl CaseReport {
    pub(crate) fn new(case_file: &str) -> Self {
        Self {
            case_file: case_file.to_string(),
            state: CaseState::Validating,
            cause: None,
            fetch: None,
            completeness: None,
            archive: None,
        }
    }

    /// Whether the archive is ready for delivery.
    pub fn is_ready(&self) -> bool {
        self.state == CaseState::CleanedUp && self.archive.is_some()
    }
}
