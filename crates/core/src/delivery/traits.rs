//! Trait definitions for the delivery module.

use async_trait::async_trait;
use std::path::Path;

use super::DeliveryError;

/// Where an archive ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Remote location of the delivered archive.
    pub remote_path: String,
    /// Bytes transferred.
    pub bytes: u64,
}

/// Uploads archives to the remote storage endpoint.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Returns the name of this delivery backend.
    fn name(&self) -> &str;

    /// Checks the endpoint accepts a session.
    async fn probe(&self) -> Result<(), DeliveryError>;

    /// Uploads a local archive into the configured remote directory, keeping its file name.
    async fn deliver(&self, archive: &Path) -> Result<DeliveryReceipt, DeliveryError>;

    /// Whether an archive with this file name already exists remotely.
    async fn exists(&self, archive_name: &str) -> Result<bool, DeliveryError>;
}
