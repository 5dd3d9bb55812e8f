//! Types for the fetcher module.

use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

use crate::casefile::Workspace;
use crate::documents::DocumentError;
use crate::signer::SignerError;

/// A document of the current listing and where it lands in the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub document_id: String,
    pub target_path: PathBuf,
}

impl DocumentDescriptor {
    /// Builds descriptors for a listing, dropping repeated document ids.
    pub fn from_listing(workspace: &Workspace, document_ids: &[String]) -> Vec<Self> {
        let mut seen = HashSet::new();
        document_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| Self {
                document_id: id.clone(),
                target_path: workspace.document_path(id),
            })
            .collect()
    }

    pub fn is_present(&self) -> bool {
        self.target_path.is_file()
    }
}

/// Why a single document fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("signer lookup failed: {0}")]
    Signer(#[from] SignerError),

    #[error("content service failed: {0}")]
    Document(#[from] DocumentError),

    #[error("content service returned an empty document")]
    EmptyDocument,

    #[error("failed to write document: {0}")]
    Io(#[from] std::io::Error),

    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Why a document was not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target file already exists from an earlier run.
    AlreadyPresent,
}

/// Result of handling one document.
#[derive(Debug)]
pub enum FetchOutcome {
    Fetched { bytes: u64 },
    Skipped(SkipReason),
    Failed(FetchError),
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FetchOutcome::Fetched { .. } => "fetched",
            FetchOutcome::Skipped(_) => "skipped",
            FetchOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub document_id: String,
    pub outcome: FetchOutcome,
}

/// Outcome of the fetch stage of one case file.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// One entry per scheduled or skipped document, in completion order.
    pub outcomes: Vec<DocumentOutcome>,
    /// Documents never scheduled because the budget ran out.
    pub unscheduled: usize,
    /// The run-wide error budget was exceeded.
    pub aborted: bool,
}

impl FetchReport {
    pub fn fetched(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Fetched { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FetchOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&FetchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|d| pred(&d.outcome)).count()
    }
}
