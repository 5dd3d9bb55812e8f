//! Mock signer lookup for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::signer::{SignerError, SignerLookup};

/// User returned for documents without a configured signer.
pub const DEFAULT_MOCK_SIGNER: &str = "mock-user";

/// Mock implementation of the SignerLookup trait.
#[derive(Debug, Default)]
pub struct MockSignerLookup {
    signers: Arc<RwLock<HashMap<String, String>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    lookups: Arc<RwLock<Vec<String>>>,
}

impl MockSignerLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the signer of a document.
    pub async fn set_signer(&self, document_id: &str, user: &str) {
        self.signers
            .write()
            .await
            .insert(document_id.to_string(), user.to_string());
    }

    /// Make the lookup of a document fail as if no row existed.
    pub async fn fail_document(&self, document_id: &str) {
        self.failing.write().await.insert(document_id.to_string());
    }

    /// Document ids looked up so far.
    pub async fn lookups(&self) -> Vec<String> {
        self.lookups.read().await.clone()
    }
}

#[async_trait]
impl SignerLookup for MockSignerLookup {
    async fn lookup(&self, document_id: &str) -> Result<String, SignerError> {
        self.lookups.write().await.push(document_id.to_string());

        if self.failing.read().await.contains(document_id) {
            return Err(SignerError::NotFound(document_id.to_string()));
        }
        Ok(self
            .signers
            .read()
            .await
            .get(document_id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_MOCK_SIGNER.to_string()))
    }
}
