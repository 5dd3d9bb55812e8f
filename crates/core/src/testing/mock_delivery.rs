//! Mock delivery client for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::delivery::{DeliveryClient, DeliveryError, DeliveryReceipt};

/// A recorded delivery for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDelivery {
    /// Local archive that was delivered.
    pub archive: PathBuf,
    /// Archive size at delivery time.
    pub bytes: u64,
}

/// Mock implementation of the DeliveryClient trait.
///
/// Provides controllable behavior for testing:
/// - Toggle reachability (affects `probe` and `deliver`)
/// - Fail deliveries of specific archive names
/// - Record delivered archives; `exists` reports them
#[derive(Debug)]
pub struct MockDeliveryClient {
    reachable: Arc<RwLock<bool>>,
    failing: Arc<RwLock<HashSet<String>>>,
    delivered: Arc<RwLock<Vec<RecordedDelivery>>>,
    probes: Arc<RwLock<usize>>,
}

impl Default for MockDeliveryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeliveryClient {
    /// Create a reachable mock client.
    pub fn new() -> Self {
        Self {
            reachable: Arc::new(RwLock::new(true)),
            failing: Arc::new(RwLock::new(HashSet::new())),
            delivered: Arc::new(RwLock::new(Vec::new())),
            probes: Arc::new(RwLock::new(0)),
        }
    }

    pub async fn set_reachable(&self, reachable: bool) {
        *self.reachable.write().await = reachable;
    }

    /// Make the delivery of `archive_name` fail mid-transfer.
    pub async fn fail_archive(&self, archive_name: &str) {
        self.failing.write().await.insert(archive_name.to_string());
    }

    pub async fn delivered(&self) -> Vec<RecordedDelivery> {
        self.delivered.read().await.clone()
    }

    /// File names of delivered archives, in delivery order.
    pub async fn delivered_names(&self) -> Vec<String> {
        self.delivered
            .read()
            .await
            .iter()
            .filter_map(|d| d.archive.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect()
    }

    pub async fn probe_count(&self) -> usize {
        *self.probes.read().await
    }

    async fn check_reachable(&self) -> Result<(), DeliveryError> {
        if *self.reachable.read().await {
            Ok(())
        } else {
            Err(DeliveryError::Unreachable(
                "mock endpoint offline".to_string(),
            ))
        }
    }
}

#[async_trait]
impl DeliveryClient for MockDeliveryClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self) -> Result<(), DeliveryError> {
        *self.probes.write().await += 1;
        self.check_reachable().await
    }

    async fn deliver(&self, archive: &Path) -> Result<DeliveryReceipt, DeliveryError> {
        self.check_reachable().await?;

        let name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = match tokio::fs::metadata(archive).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(DeliveryError::ArchiveMissing {
                    path: archive.to_path_buf(),
                })
            }
        };
        if self.failing.read().await.contains(&name) {
            return Err(DeliveryError::Transfer {
                path: archive.to_path_buf(),
                reason: "mock transfer failure".to_string(),
            });
        }

        self.delivered.write().await.push(RecordedDelivery {
            archive: archive.to_path_buf(),
            bytes,
        });
        Ok(DeliveryReceipt {
            remote_path: format!("mock://{}", name),
            bytes,
        })
    }

    async fn exists(&self, archive_name: &str) -> Result<bool, DeliveryError> {
        self.check_reachable().await?;
        Ok(self
            .delivered
            .read()
            .await
            .iter()
            .any(|d| d.archive.file_name().map(|n| n.to_string_lossy() == archive_name) == Some(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_deliver_records_and_exists() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        std::fs::write(&archive, b"zip").unwrap();

        let client = MockDeliveryClient::new();
        let receipt = client.deliver(&archive).await.unwrap();
        assert_eq!(receipt.bytes, 3);
        assert!(client.exists("a.zip").await.unwrap());
        assert!(!client.exists("b.zip").await.unwrap());
        assert_eq!(client.delivered_names().await, vec!["a.zip"]);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let client = MockDeliveryClient::new();
        client.set_reachable(false).await;
        assert!(matches!(
            client.probe().await,
            Err(DeliveryError::Unreachable(_))
        ));
        assert_eq!(client.probe_count().await, 1);
    }
}
