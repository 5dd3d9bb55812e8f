//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every external service
//! trait the pipeline depends on, so whole runs can be exercised without a
//! token service, SOAP endpoints, an Oracle database or an SFTP server.
//!
//! # Example
//!
//! ```rust,ignore
//! use dossier_core::testing::{MockDeliveryClient, MockDocumentService, MockSignerLookup};
//!
//! let documents = MockDocumentService::new();
//! documents.set_listing("EX-2023-1- -GDEBA-A", &["IF-1", "IF-2"]).await;
//!
//! let delivery = MockDeliveryClient::new();
//! delivery.set_reachable(false).await;
//! ```

mod mock_delivery;
mod mock_documents;
mod mock_signer;

pub use mock_delivery::{MockDeliveryClient, RecordedDelivery};
pub use mock_documents::{MockDocumentService, RecordedRequest};
pub use mock_signer::{MockSignerLookup, DEFAULT_MOCK_SIGNER};

/// Test fixtures and helper functions.
pub mod fixtures {
    /// A well-formed case-file identifier, distinct per `n`.
    pub fn case_file_id(n: u32) -> String {
        format!("EX-2023-{}- -GDEBA-TESTGDEBA", n)
    }

    /// `count` document ids belonging to case file `n`.
    pub fn document_ids(n: u32, count: usize) -> Vec<String> {
        (1..=count)
            .map(|i| format!("IF-2023-{}{:03}-GDEBA-TESTGDEBA", n, i))
            .collect()
    }
}
