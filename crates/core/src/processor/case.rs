//! Case processor implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::types::{CaseReport, CaseState};
use crate::casefile::{CaseFileId, Workspace};
use crate::documents::DocumentService;
use crate::fetcher::{ConcurrentDocumentFetcher, DocumentDescriptor, ErrorBudget};
use crate::metrics;
use crate::packager::{check_completeness, ArchivePackager};
use crate::signer::SignerLookup;

/// Drives one case file from identifier to packaged archive.
pub struct CaseProcessor {
    downloads_dir: PathBuf,
    documents: Arc<dyn DocumentService>,
    fetcher: ConcurrentDocumentFetcher,
    packager: ArchivePackager,
}

impl CaseProcessor {
    pub fn new(
        downloads_dir: impl Into<PathBuf>,
        documents: Arc<dyn DocumentService>,
        signers: Arc<dyn SignerLookup>,
        max_concurrent_fetches: usize,
    ) -> Self {
        let fetcher =
            ConcurrentDocumentFetcher::new(Arc::clone(&documents), signers, max_concurrent_fetches);
        Self {
            downloads_dir: downloads_dir.into(),
            documents,
            fetcher,
            packager: ArchivePackager::new(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Processes `identifier` and returns its terminal state.
    ///
    /// Document fetch failures are charged to `budget`; a report in
    /// [`CaseState::FetchAborted`] means the budget ran out and the caller
    /// should stop the run.
    pub async fn process(&self, identifier: &str, budget: &Arc<ErrorBudget>) -> CaseReport {
        let mut report = CaseReport::new(identifier);
        self.run_stages(&mut report, budget).await;

        metrics::CASE_FILES_TOTAL
            .with_label_values(&[report.state.as_str()])
            .inc();
        let cause = report.cause.as_deref().unwrap_or("");
        match report.state {
            CaseState::CleanedUp => {
                info!(case_file = %report.case_file, "Case file packaged")
            }
            CaseState::Incomplete | CaseState::Rejected => {
                warn!(case_file = %report.case_file, state = %report.state, cause, "Case file not packaged")
            }
            _ => {
                error!(case_file = %report.case_file, state = %report.state, cause, "Case file failed")
            }
        }
        report
    }

    async fn run_stages(&self, report: &mut CaseReport, budget: &Arc<ErrorBudget>) {
        let case_file = match CaseFileId::parse(&report.case_file) {
            Ok(id) => id,
            Err(e) => return finish(report, CaseState::Rejected, e),
        };

        let workspace = Workspace::new(&self.downloads_dir, &case_file);
        if let Err(e) = workspace.ensure().await {
            return finish(report, CaseState::WorkspaceFailed, e);
        }
        if let Err(e) = workspace.sweep_partials().await {
            warn!(case_file = %case_file, error = %e, "Could not sweep partial documents");
        }

        let listing = match self.documents.list_documents(&case_file).await {
            Ok(listing) if listing.is_empty() => {
                return finish(report, CaseState::ListingFailed, "no documents");
            }
            Ok(listing) => listing,
            Err(e) => return finish(report, CaseState::ListingFailed, e),
        };

        let descriptors = DocumentDescriptor::from_listing(&workspace, &listing);
        transition(report, CaseState::Fetching);
        debug!(case_file = %case_file, documents = descriptors.len(), "Fetching documents");

        let started = Instant::now();
        let fetch = self.fetcher.fetch_all(&descriptors, budget).await;
        let aborted = fetch.aborted;
        report.fetch = Some(fetch);

        if aborted {
            observe_fetch(started, "aborted");
            let cause = format!(
                "error budget exceeded ({} failures, max {})",
                budget.failures(),
                budget.max()
            );
            return finish(report, CaseState::FetchAborted, cause);
        }

        let completeness = check_completeness(&descriptors);
        let complete = completeness.is_complete();
        let cause = format!(
            "{} of {} documents missing",
            completeness.missing.len(),
            completeness.expected
        );
        report.completeness = Some(completeness);
        if !complete {
            observe_fetch(started, "incomplete");
            return finish(report, CaseState::Incomplete, cause);
        }
        observe_fetch(started, "complete");
        transition(report, CaseState::Complete);

        transition(report, CaseState::Packaging);
        match self.packager.compress(workspace.path()).await {
            Ok(archive) => report.archive = Some(archive),
            Err(e) => return finish(report, CaseState::PackagingFailed, e),
        }
        transition(report, CaseState::Packaged);

        if let Err(e) = self.packager.cleanup(workspace.path()).await {
            return finish(report, CaseState::CleanupFailed, e);
        }
        transition(report, CaseState::CleanedUp);
    }
}

fn transition(report: &mut CaseReport, state: CaseState) {
    debug!(case_file = %report.case_file, from = %report.state, to = %state, "Case state change");
    report.state = state;
}

fn finish(report: &mut CaseReport, state: CaseState, cause: impl ToString) {
    transition(report, state);
    report.cause = Some(cause.to_string());
}

fn observe_fetch(started: Instant, result: &str) {
    metrics::FETCH_DURATION
        .with_label_values(&[result])
        .observe(started.elapsed().as_secs_f64());
}
