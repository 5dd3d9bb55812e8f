//! Mock document service for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::casefile::CaseFileId;
use crate::documents::{DocumentError, DocumentService};

/// A recorded content request: `(document_id, requesting_user)`.
pub type RecordedRequest = (String, String);

/// Mock implementation of the DocumentService trait.
///
/// Provides controllable behavior for testing:
/// - Per-case-file listings, or listing failures
/// - Per-document content, failures and a fetch delay
/// - Records every content request and the peak number of concurrent fetches
///
/// Documents without configured content return a small fake PDF.
///
/// # Example
///
/// ```rust,ignore
/// let documents = MockDocumentService::new();
/// documents.set_listing("EX-2023-1- -GDEBA-A", &["IF-1", "IF-2"]).await;
/// documents.fail_document("IF-2").await;
///
/// // ... run the fetcher ...
///
/// assert_eq!(documents.fetched_documents().await, vec!["IF-1", "IF-2"]);
/// ```
#[derive(Debug, Default)]
pub struct MockDocumentService {
    listings: Arc<RwLock<HashMap<String, Vec<String>>>>,
    failing_listings: Arc<RwLock<HashSet<String>>>,
    unauthorized: Arc<RwLock<bool>>,
    contents: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    failing_documents: Arc<RwLock<HashSet<String>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
    listing_requests: Arc<RwLock<Vec<String>>>,
    fetch_delay: Arc<RwLock<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockDocumentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the documents listed for a case file.
    pub async fn set_listing<S: AsRef<str>>(&self, case_file: &str, document_ids: &[S]) {
        self.listings.write().await.insert(
            case_file.to_string(),
            document_ids.iter().map(|d| d.as_ref().to_string()).collect(),
        );
    }

    /// Make the listing of a case file fail with a SOAP fault.
    pub async fn fail_listing(&self, case_file: &str) {
        self.failing_listings
            .write()
            .await
            .insert(case_file.to_string());
    }

    /// Reject every call as unauthorized.
    pub async fn set_unauthorized(&self, unauthorized: bool) {
        *self.unauthorized.write().await = unauthorized;
    }

    /// Set the bytes returned for a document.
    pub async fn set_content(&self, document_id: &str, content: Vec<u8>) {
        self.contents
            .write()
            .await
            .insert(document_id.to_string(), content);
    }

    /// Make fetching a document fail with HTTP 500.
    pub async fn fail_document(&self, document_id: &str) {
        self.failing_documents
            .write()
            .await
            .insert(document_id.to_string());
    }

    /// Forget every configured listing and document failure.
    pub async fn clear_failures(&self) {
        self.failing_listings.write().await.clear();
        self.failing_documents.write().await.clear();
    }

    /// Delay every content request.
    pub async fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.write().await = delay;
    }

    /// Every content request, in arrival order.
    pub async fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    /// Document ids of every content request, failed ones included.
    pub async fn fetched_documents(&self) -> Vec<String> {
        self.requests
            .read()
            .await
            .iter()
            .map(|(doc, _)| doc.clone())
            .collect()
    }

    /// Case files whose listing was requested.
    pub async fn listing_requests(&self) -> Vec<String> {
        self.listing_requests.read().await.clone()
    }

    /// Highest number of content requests observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn check_authorized(&self) -> Result<(), DocumentError> {
        if *self.unauthorized.read().await {
            return Err(DocumentError::Unauthorized(
                "mock credentials rejected".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentService for MockDocumentService {
    async fn list_documents(&self, case_file: &CaseFileId) -> Result<Vec<String>, DocumentError> {
        self.listing_requests
            .write()
            .await
            .push(case_file.as_str().to_string());
        self.check_authorized().await?;

        if self.failing_listings.read().await.contains(case_file.as_str()) {
            return Err(DocumentError::Fault(format!(
                "mock listing failure for {}",
                case_file
            )));
        }
        Ok(self
            .listings
            .read()
            .await
            .get(case_file.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_document(
        &self,
        document_id: &str,
        requesting_user: &str,
    ) -> Result<Vec<u8>, DocumentError> {
        self.requests
            .write()
            .await
            .push((document_id.to_string(), requesting_user.to_string()));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.fetch_delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.check_authorized().await?;
        if self.failing_documents.read().await.contains(document_id) {
            return Err(DocumentError::Http {
                status: 500,
                body: format!("mock failure for {}", document_id),
            });
        }

        Ok(self
            .contents
            .read()
            .await
            .get(document_id)
            .cloned()
            .unwrap_or_else(|| format!("%PDF-1.4 {}", document_id).into_bytes()))
    }
}
