//! Run lifecycle integration tests.
//!
//! These tests drive whole runs through the public API with mock services:
//! - Delivered case files are marked completed, others stay pending
//! - The error budget aborts the run at the case file that exceeds it
//! - An unreachable delivery endpoint leaves the queue untouched
//! - A second run resumes incomplete case files

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use dossier_core::{
    queue::CaseFileStatus,
    testing::{
        fixtures::{case_file_id, document_ids},
        MockDeliveryClient, MockDocumentService, MockSignerLookup,
    },
    CaseProcessor, CaseState, RunController, RunError, SqliteQueueStore, WorkQueueStore,
};

/// Test helper wiring a controller to mocks and a file-backed queue.
struct TestHarness {
    store: Arc<SqliteQueueStore>,
    documents: Arc<MockDocumentService>,
    signers: Arc<MockSignerLookup>,
    delivery: Arc<MockDeliveryClient>,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(temp_dir.path().join("downloads")).unwrap();
        let store = Arc::new(
            SqliteQueueStore::new(&temp_dir.path().join("queue.db"))
                .expect("Failed to create queue store"),
        );
        Self {
            store,
            documents: Arc::new(MockDocumentService::new()),
            signers: Arc::new(MockSignerLookup::new()),
            delivery: Arc::new(MockDeliveryClient::new()),
            temp_dir,
        }
    }

    fn downloads(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("downloads")
    }

    fn controller(&self, max_errors: usize, max_concurrent: usize) -> RunController {
        let processor = CaseProcessor::new(
            self.downloads(),
            self.documents.clone(),
            self.signers.clone(),
            max_concurrent,
        );
        RunController::new(
            self.store.clone(),
            processor,
            self.delivery.clone(),
            max_errors,
        )
    }

    fn load(&self, identifiers: &[String]) {
        self.store.load(identifiers).expect("Failed to load queue");
    }

    fn status(&self, identifier: &str) -> CaseFileStatus {
        self.store
            .records()
            .unwrap()
            .into_iter()
            .find(|r| r.identifier == identifier)
            .map(|r| r.status)
            .expect("identifier not in queue")
    }
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_complete_and_incomplete_case_files() {
    let harness = TestHarness::new();
    let a = case_file_id(1);
    let b = case_file_id(2);
    harness.load(&[a.clone(), b.clone()]);

    harness.documents.set_listing(&a, &document_ids(1, 3)).await;
    let b_docs = document_ids(2, 3);
    harness.documents.set_listing(&b, &b_docs).await;
    harness.documents.fail_document(&b_docs[1]).await;

    let summary = harness.controller(10, 4).run().await.unwrap();

    assert_eq!(summary.total, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.incomplete, 1);
    assert!(!summary.is_clean());
    assert_eq!(harness.status(&a), CaseFileStatus::Completed);
    assert_eq!(harness.status(&b), CaseFileStatus::Pending);
    assert_eq!(harness.store.count_pending(), 1);

    // A was delivered and fully cleaned up; B keeps its partial workspace.
    assert_eq!(
        harness.delivery.delivered_names().await,
        vec![format!("{}.zip", a)]
    );
    assert!(!harness.downloads().join(&a).exists());
    assert!(!harness.downloads().join(format!("{}.zip", a)).exists());
    assert_eq!(file_count(&harness.downloads().join(&b)), 2);
}

#[tokio::test]
async fn test_budget_boundary_aborts_on_third_failure() {
    let harness = TestHarness::new();
    let (a, b, c) = (case_file_id(1), case_file_id(2), case_file_id(3));
    harness.load(&[a.clone(), b.clone(), c.clone()]);

    // A: two failures, budget of 2 still holds.
    let a_docs = document_ids(1, 3);
    harness.documents.set_listing(&a, &a_docs).await;
    harness.documents.fail_document(&a_docs[0]).await;
    harness.documents.fail_document(&a_docs[1]).await;
    // B: the third failure exceeds it.
    let b_docs = document_ids(2, 2);
    harness.documents.set_listing(&b, &b_docs).await;
    harness.documents.fail_document(&b_docs[0]).await;
    harness.documents.set_listing(&c, &document_ids(3, 1)).await;

    let err = harness.controller(2, 1).run().await.unwrap_err();

    let summary = match err {
        RunError::BudgetExceeded(summary) => summary,
        other => panic!("expected budget abort, got {other}"),
    };
    assert!(summary.aborted);
    assert_eq!(summary.incomplete, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.document_failures, 3);
    assert_eq!(summary.processed(), 2);

    // C never started.
    let listed = harness.documents.listing_requests().await;
    assert_eq!(listed, vec![a.clone(), b.clone()]);
    for id in [&a, &b, &c] {
        assert_eq!(harness.status(id), CaseFileStatus::Pending);
    }
    assert!(harness.delivery.delivered().await.is_empty());
}

#[tokio::test]
async fn test_unreachable_delivery_leaves_queue_untouched() {
    let harness = TestHarness::new();
    let ids = vec![case_file_id(1), case_file_id(2)];
    harness.load(&ids);
    harness.delivery.set_reachable(false).await;

    let before = harness.store.records().unwrap();
    let err = harness.controller(10, 4).run().await.unwrap_err();

    assert!(matches!(err, RunError::DeliveryUnreachable(_)));
    assert_eq!(harness.store.records().unwrap(), before);
    assert_eq!(file_count(&harness.downloads()), 0);
    assert!(harness.documents.listing_requests().await.is_empty());
}

#[tokio::test]
async fn test_second_run_resumes_incomplete_case_file() {
    let harness = TestHarness::new();
    let id = case_file_id(7);
    harness.load(&[id.clone()]);
    let docs = document_ids(7, 4);
    harness.documents.set_listing(&id, &docs).await;
    harness.documents.fail_document(&docs[3]).await;

    let first = harness.controller(10, 2).run().await.unwrap();
    assert_eq!(first.incomplete, 1);
    let kept = harness.downloads().join(&id).join(format!("{}.pdf", docs[0]));
    let first_bytes = std::fs::read(&kept).unwrap();

    harness.documents.clear_failures().await;
    let second = harness.controller(10, 2).run().await.unwrap();

    assert_eq!(second.total, 1);
    assert_eq!(second.completed, 1);
    assert!(second.is_clean());
    assert_eq!(harness.status(&id), CaseFileStatus::Completed);

    // Only the missing document was requested again.
    let requests = harness.documents.fetched_documents().await;
    assert_eq!(requests.len(), 5);
    assert_eq!(requests.iter().filter(|d| **d == docs[3]).count(), 2);
    assert_eq!(requests.iter().filter(|d| **d == docs[0]).count(), 1);
    assert!(!first_bytes.is_empty());

    let third = harness.controller(10, 2).run().await.unwrap();
    assert_eq!(third.total, 0);
}

#[tokio::test]
async fn test_rejected_identifiers_stay_pending() {
    let harness = TestHarness::new();
    let good = case_file_id(1);
    let bad = "EX-2023-1-GDEBA".to_string();
    harness.load(&[bad.clone(), good.clone()]);
    harness.documents.set_listing(&good, &document_ids(1, 1)).await;

    let summary = harness.controller(0, 1).run().await.unwrap();

    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(harness.status(&bad), CaseFileStatus::Pending);
    assert_eq!(harness.status(&good), CaseFileStatus::Completed);
    assert!(!harness.downloads().join(&bad).exists());
}

#[tokio::test]
async fn test_process_one_packages_without_delivering() {
    let harness = TestHarness::new();
    let id = case_file_id(9);
    harness.documents.set_listing(&id, &document_ids(9, 2)).await;

    let report = harness.controller(10, 2).process_one(&id).await;

    assert_eq!(report.state, CaseState::CleanedUp);
    assert!(harness.downloads().join(format!("{}.zip", id)).is_file());
    assert!(harness.delivery.delivered().await.is_empty());
}
