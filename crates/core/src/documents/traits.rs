//! Trait definitions for the document services.

use async_trait::async_trait;

use super::DocumentError;
use crate::casefile::CaseFileId;

/// Supplies bearer tokens for the document services.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, DocumentError>;
}

/// Listing and content retrieval for case-file documents.
#[async_trait]
pub trait DocumentService: Send + Sync {
    /// Returns the official document identifiers of a case file, in listing order.
    ///
    /// An empty list means the case file has no documents; rejected
    /// credentials surface as [`DocumentError::Unauthorized`].
    async fn list_documents(&self, case_file: &CaseFileId) -> Result<Vec<String>, DocumentError>;

    /// Returns the raw bytes of a document, requested on behalf of `requesting_user`.
    async fn fetch_document(
        &self,
        document_id: &str,
        requesting_user: &str,
    ) -> Result<Vec<u8>, DocumentError>;
}
