//! Run controller implementation.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::types::{RunError, RunProgress, RunProgressCallback, RunSummary};
use crate::delivery::DeliveryClient;
use crate::fetcher::ErrorBudget;
use crate::metrics;
use crate::packager::PackagedArchive;
use crate::processor::{CaseProcessor, CaseReport, CaseState};
use crate::queue::WorkQueueStore;

/// Processes the pending queue sequentially and delivers finished archives.
pub struct RunController {
    store: Arc<dyn WorkQueueStore>,
    processor: CaseProcessor,
    delivery: Arc<dyn DeliveryClient>,
    max_errors: usize,
    progress: Option<RunProgressCallback>,
}

impl RunController {
    /// `max_errors` document failures are tolerated per run; one more aborts it.
    pub fn new(
        store: Arc<dyn WorkQueueStore>,
        processor: CaseProcessor,
        delivery: Arc<dyn DeliveryClient>,
        max_errors: usize,
    ) -> Self {
        Self {
            store,
            processor,
            delivery,
            max_errors,
            progress: None,
        }
    }

    /// Sets a callback for progress notifications.
    pub fn with_progress(mut self, callback: RunProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Runs the whole pending queue.
    ///
    /// Returns the summary of a finished run, even when some case files
    /// failed. An unreachable endpoint or unreadable queue fails before any
    /// work is done; an exceeded error budget returns the partial summary in
    /// [`RunError::BudgetExceeded`].
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let mut summary = RunSummary::new(uuid::Uuid::new_v4().to_string());
        let run_id = summary.run_id.clone();

        if let Err(e) = self.delivery.probe().await {
            error!(run_id = %run_id, backend = self.delivery.name(), error = %e, "Delivery endpoint unreachable, aborting run");
            metrics::RUNS_TOTAL.with_label_values(&["refused"]).inc();
            return Err(RunError::DeliveryUnreachable(e));
        }

        let pending = match self.store.list_pending() {
            Ok(pending) => pending,
            Err(e) => {
                error!(run_id = %run_id, error = %e, "Could not read pending case files");
                metrics::RUNS_TOTAL.with_label_values(&["refused"]).inc();
                return Err(RunError::Store(e));
            }
        };

        summary.total = pending.len();
        self.notify(RunProgress::Started {
            total: summary.total,
        });
        if pending.is_empty() {
            info!(run_id = %run_id, "No pending case files");
            summary.finished_at = Some(Utc::now());
            metrics::RUNS_TOTAL.with_label_values(&["finished"]).inc();
            return Ok(summary);
        }

        info!(run_id = %run_id, pending = pending.len(), max_errors = self.max_errors, "Run started");
        let budget = Arc::new(ErrorBudget::new(self.max_errors));

        for (index, identifier) in pending.iter().enumerate() {
            self.notify(RunProgress::CaseStarted {
                index,
                case_file: identifier.clone(),
            });

            let report = self.processor.process(identifier, &budget).await;
            let delivered = match report.state {
                CaseState::CleanedUp => {
                    let done = self.finalize(&report).await;
                    if done {
                        summary.completed += 1;
                    } else {
                        summary.failed += 1;
                    }
                    done
                }
                CaseState::Incomplete => {
                    summary.incomplete += 1;
                    false
                }
                CaseState::Rejected => {
                    summary.rejected += 1;
                    false
                }
                CaseState::FetchAborted => {
                    summary.failed += 1;
                    summary.aborted = true;
                    false
                }
                _ => {
                    summary.failed += 1;
                    false
                }
            };

            self.notify(RunProgress::CaseFinished {
                index,
                case_file: identifier.clone(),
                state: report.state,
                delivered,
            });

            if summary.aborted {
                summary.document_failures = budget.failures();
                summary.finished_at = Some(Utc::now());
                error!(
                    run_id = %run_id,
                    case_file = %identifier,
                    failures = budget.failures(),
                    max_errors = self.max_errors,
                    "Error budget exceeded, aborting run"
                );
                metrics::RUNS_TOTAL.with_label_values(&["aborted"]).inc();
                return Err(RunError::BudgetExceeded(summary));
            }
        }

        summary.document_failures = budget.failures();
        summary.finished_at = Some(Utc::now());
        info!(
            run_id = %run_id,
            total = summary.total,
            completed = summary.completed,
            incomplete = summary.incomplete,
            rejected = summary.rejected,
            failed = summary.failed,
            document_failures = summary.document_failures,
            "Run finished"
        );
        metrics::RUNS_TOTAL.with_label_values(&["finished"]).inc();
        Ok(summary)
    }

    /// Processes one case file with a fresh error budget, without delivering it.
    pub async fn process_one(&self, identifier: &str) -> CaseReport {
        let budget = Arc::new(ErrorBudget::new(self.max_errors));
        self.processor.process(identifier, &budget).await
    }

    /// Delivers the archive, removes the local copy and marks the case file completed.
    ///
    /// Returns whether the case file ended up marked completed. Failures are
    /// logged; the identifier then stays pending.
    async fn finalize(&self, report: &CaseReport) -> bool {
        let Some(archive) = report.archive.as_ref() else {
            return false;
        };
        let case_file = report.case_file.as_str();

        if !self.deliver(case_file, archive).await {
            return false;
        }

        if let Err(e) = tokio::fs::remove_file(&archive.path).await {
            warn!(case_file, archive = %archive.path.display(), error = %e, "Could not remove delivered archive");
        }

        match self.store.mark_completed(case_file) {
            Ok(()) => true,
            Err(e) => {
                error!(case_file, error = %e, "Delivered but could not mark completed");
                false
            }
        }
    }

    async fn deliver(&self, case_file: &str, archive: &PackagedArchive) -> bool {
        match self.delivery.deliver(&archive.path).await {
            Ok(receipt) => {
                metrics::DELIVERIES_TOTAL.with_label_values(&["success"]).inc();
                info!(
                    case_file,
                    remote_path = %receipt.remote_path,
                    bytes = receipt.bytes,
                    sha256 = %archive.sha256,
                    "Archive delivered"
                );
                true
            }
            Err(e) => {
                metrics::DELIVERIES_TOTAL.with_label_values(&["failure"]).inc();
                error!(case_file, archive = %archive.path.display(), error = %e, "Archive delivery failed");
                false
            }
        }
    }

    fn notify(&self, progress: RunProgress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{CaseFileStatus, SqliteQueueStore};
    use crate::testing::fixtures::{case_file_id, document_ids};
    use crate::testing::{MockDeliveryClient, MockDocumentService, MockSignerLookup};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        store: Arc<SqliteQueueStore>,
        documents: Arc<MockDocumentService>,
        signers: Arc<MockSignerLookup>,
        delivery: Arc<MockDeliveryClient>,
        temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(SqliteQueueStore::in_memory().unwrap()),
                documents: Arc::new(MockDocumentService::new()),
                signers: Arc::new(MockSignerLookup::new()),
                delivery: Arc::new(MockDeliveryClient::new()),
                temp: TempDir::new().unwrap(),
            }
        }

        fn controller(&self, max_errors: usize) -> RunController {
            let processor = CaseProcessor::new(
                self.temp.path(),
                self.documents.clone(),
                self.signers.clone(),
                2,
            );
            RunController::new(
                self.store.clone(),
                processor,
                self.delivery.clone(),
                max_errors,
            )
        }

        fn status(&self, identifier: &str) -> CaseFileStatus {
            self.store
                .records()
                .unwrap()
                .into_iter()
                .find(|r| r.identifier == identifier)
                .unwrap()
                .status
        }
    }

    #[tokio::test]
    async fn test_delivered_case_is_completed_and_archive_removed() {
        let fx = Fixture::new();
        let id = case_file_id(1);
        fx.store.load(&[id.clone()]).unwrap();
        fx.documents.set_listing(&id, &document_ids(1, 2)).await;

        let summary = fx.controller(5).run().await.unwrap();

        assert_eq!(summary.completed, 1);
        assert!(summary.is_clean());
        assert_eq!(fx.status(&id), CaseFileStatus::Completed);
        assert_eq!(
            fx.delivery.delivered_names().await,
            vec![format!("{}.zip", id)]
        );
        assert_eq!(std::fs::read_dir(fx.temp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_refuses_run() {
        let fx = Fixture::new();
        let id = case_file_id(1);
        fx.store.load(&[id.clone()]).unwrap();
        fx.delivery.set_reachable(false).await;

        let err = fx.controller(5).run().await.unwrap_err();

        assert!(matches!(err, RunError::DeliveryUnreachable(_)));
        assert_eq!(fx.status(&id), CaseFileStatus::Pending);
        assert!(fx.documents.listing_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_unloaded_queue_is_a_store_error() {
        let fx = Fixture::new();
        let err = fx.controller(5).run().await.unwrap_err();
        assert!(matches!(err, RunError::Store(_)));
    }

    #[tokio::test]
    async fn test_empty_queue_is_clean() {
        let fx = Fixture::new();
        fx.store.load(&[]).unwrap();

        let summary = fx.controller(5).run().await.unwrap();

        assert_eq!(summary.total, 0);
        assert!(summary.is_clean());
        assert!(summary.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_packaging_failure_keeps_case_pending() {
        let fx = Fixture::new();
        let (a, b) = (case_file_id(4), case_file_id(5));
        fx.store.load(&[a.clone(), b.clone()]).unwrap();
        fx.documents.set_listing(&a, &document_ids(4, 2)).await;
        fx.documents.set_listing(&b, &document_ids(5, 1)).await;
        std::fs::create_dir_all(fx.temp.path().join(format!("{}.zip", a))).unwrap();

        let summary = fx.controller(5).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(summary.completed, 1);
        assert!(!summary.is_clean());
        assert_eq!(fx.status(&a), CaseFileStatus::Pending);
        assert_eq!(fx.status(&b), CaseFileStatus::Completed);
        assert_eq!(
            fx.delivery.delivered_names().await,
            vec![format!("{}.zip", b)]
        );
        assert!(fx.temp.path().join(&a).is_dir());
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_case_pending() {
        let fx = Fixture::new();
        let id = case_file_id(2);
        fx.store.load(&[id.clone()]).unwrap();
        fx.documents.set_listing(&id, &document_ids(2, 1)).await;
        fx.delivery.fail_archive(&format!("{}.zip", id)).await;

        let summary = fx.controller(5).run().await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(fx.status(&id), CaseFileStatus::Pending);
        assert!(fx.temp.path().join(format!("{}.zip", id)).is_file());
    }

    #[tokio::test]
    async fn test_progress_callback() {
        let fx = Fixture::new();
        let ids = vec![case_file_id(1), "bogus".to_string()];
        fx.store.load(&ids).unwrap();
        fx.documents.set_listing(&ids[0], &document_ids(1, 1)).await;

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let controller = fx
            .controller(5)
            .with_progress(Arc::new(move |p| sink.lock().unwrap().push(p)));

        let summary = controller.run().await.unwrap();
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.rejected, 1);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], RunProgress::Started { total: 2 }));
        assert!(matches!(
            events[4],
            RunProgress::CaseFinished {
                index: 1,
                state: CaseState::Rejected,
                delivered: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_process_one_does_not_deliver() {
        let fx = Fixture::new();
        let id = case_file_id(3);
        fx.documents.set_listing(&id, &document_ids(3, 2)).await;

        let report = fx.controller(5).process_one(&id).await;

        assert_eq!(report.state, CaseState::CleanedUp);
        assert!(fx.delivery.delivered().await.is_empty());
        assert!(fx.temp.path().join(format!("{}.zip", id)).is_file());
    }
}
