//! Concurrent fetcher implementation.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::budget::ErrorBudget;
use super::types::{
    DocumentDescriptor, DocumentOutcome, FetchError, FetchOutcome, FetchReport, SkipReason,
};
use crate::casefile::PART_SUFFIX;
use crate::documents::DocumentService;
use crate::metrics;
use crate::signer::SignerLookup;

/// Fetches case-file documents with a fixed number of workers.
pub struct ConcurrentDocumentFetcher {
    documents: Arc<dyn DocumentService>,
    signers: Arc<dyn SignerLookup>,
    max_concurrent: usize,
}

impl ConcurrentDocumentFetcher {
    /// Creates a fetcher running at most `max_concurrent` fetches at once (minimum 1).
    pub fn new(
        documents: Arc<dyn DocumentService>,
        signers: Arc<dyn SignerLookup>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            documents,
            signers,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Fetches every descriptor whose target file is missing.
    ///
    /// Failures are recorded in `budget`. When the budget is exceeded, fetches
    /// already started are awaited and the rest are left unscheduled.
    pub async fn fetch_all(
        &self,
        descriptors: &[DocumentDescriptor],
        budget: &Arc<ErrorBudget>,
    ) -> FetchReport {
        let workers = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut report = FetchReport::default();

        for (idx, descriptor) in descriptors.iter().enumerate() {
            if descriptor.is_present() {
                report.outcomes.push(skipped(descriptor));
                continue;
            }

            // Waits for a free worker; finished workers have already
            // recorded their failures by the time their permit is released.
            let permit = match Arc::clone(&workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            if budget.exceeded() {
                for rest in &descriptors[idx..] {
                    if rest.is_present() {
                        report.outcomes.push(skipped(rest));
                    } else {
                        report.unscheduled += 1;
                    }
                }
                warn!(
                    failures = budget.failures(),
                    max = budget.max(),
                    unscheduled = report.unscheduled,
                    "Error budget exceeded, not scheduling further fetches"
                );
                break;
            }

            let worker = tokio::spawn(fetch_one(
                Arc::clone(&self.documents),
                Arc::clone(&self.signers),
                descriptor.clone(),
                Arc::clone(budget),
            ));
            let document_id = descriptor.document_id.clone();
            let budget = Arc::clone(budget);
            tasks.spawn(async move {
                let outcome = match worker.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        budget.record_failure();
                        metrics::DOCUMENTS_TOTAL.with_label_values(&["failed"]).inc();
                        FetchOutcome::Failed(FetchError::Task(e.to_string()))
                    }
                };
                drop(permit);
                DocumentOutcome {
                    document_id,
                    outcome,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                // The wrapper only awaits the worker; reaching this means the runtime is shutting down.
                Err(e) => warn!(error = %e, "Fetch wrapper task failed"),
            }
        }

        report.aborted = budget.exceeded();
        report
    }
}

fn skipped(descriptor: &DocumentDescriptor) -> DocumentOutcome {
    metrics::DOCUMENTS_TOTAL.with_label_values(&["skipped"]).inc();
    DocumentOutcome {
        document_id: descriptor.document_id.clone(),
        outcome: FetchOutcome::Skipped(SkipReason::AlreadyPresent),
    }
}

async fn fetch_one(
    documents: Arc<dyn DocumentService>,
    signers: Arc<dyn SignerLookup>,
    descriptor: DocumentDescriptor,
    budget: Arc<ErrorBudget>,
) -> FetchOutcome {
    let document_id = descriptor.document_id.as_str();

    let result: Result<u64, FetchError> = async {
        let signer = signers.lookup(document_id).await?;
        let content = documents.fetch_document(document_id, &signer).await?;
        if content.is_empty() {
            return Err(FetchError::EmptyDocument);
        }
        write_document(&descriptor.target_path, &content).await?;
        Ok(content.len() as u64)
    }
    .await;

    match result {
        Ok(bytes) => {
            debug!(document_id, bytes, "Document fetched");
            metrics::DOCUMENTS_TOTAL.with_label_values(&["fetched"]).inc();
            metrics::DOCUMENT_BYTES.inc_by(bytes);
            FetchOutcome::Fetched { bytes }
        }
        Err(e) => {
            let exceeded = budget.record_failure();
            warn!(
                document_id,
                error = %e,
                failures = budget.failures(),
                budget_exceeded = exceeded,
                "Document fetch failed"
            );
            metrics::DOCUMENTS_TOTAL.with_label_values(&["failed"]).inc();
            FetchOutcome::Failed(e)
        }
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(".");
    name.push(PART_SUFFIX);
    PathBuf::from(name)
}

/// Writes to `<target>.part` and renames it, so a document only shows up
/// under its final name once complete.
async fn write_document(target: &Path, content: &[u8]) -> std::io::Result<()> {
    let part = part_path(target);
    let written = async {
        fs::write(&part, content).await?;
        fs::rename(&part, target).await
    }
    .await;

    if written.is_err() {
        let _ = fs::remove_file(&part).await;
    }
    written
}
