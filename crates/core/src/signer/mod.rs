//! Signer lookup: which user generated a given document.
//!
//! The content service only hands out a document to the user that signed
//! it, so every fetch first resolves the signer through [`SignerLookup`].

#[cfg(feature = "oracle")]
mod oracle_lookup;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(feature = "oracle")]
pub use oracle_lookup::OracleSignerLookup;

/// Errors from a signer lookup.
#[derive(Debug, Error)]
pub enum SignerError {
    /// No row for the document.
    #[error("No signer recorded for document {0}")]
    NotFound(String),

    /// Could not obtain a connection.
    #[error("Signer database unavailable: {0}")]
    Unavailable(String),

    /// Query failed.
    #[error("Signer query failed: {0}")]
    Query(String),
}

/// Resolves the originating user of a document.
///
/// Implementations are shared by every fetch worker of a run and must allow
/// concurrent calls.
#[async_trait]
pub trait SignerLookup: Send + Sync {
    async fn lookup(&self, document_id: &str) -> Result<String, SignerError>;
}
