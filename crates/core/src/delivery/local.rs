//! Local directory delivery backend, for dry runs and mounted shares.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

use super::{DeliveryClient, DeliveryError, DeliveryReceipt};
use crate::packager::sha256_file;

/// Copies archives into a local (or mounted) directory and verifies the copy.
pub struct LocalDirDelivery {
    dir: PathBuf,
}

impl LocalDirDelivery {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl DeliveryClient for LocalDirDelivery {
    fn name(&self) -> &str {
        "local"
    }

    async fn probe(&self) -> Result<(), DeliveryError> {
        match fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(DeliveryError::Unreachable(format!(
                "{} is not a directory",
                self.dir.display()
            ))),
            Err(e) => Err(DeliveryError::Unreachable(format!(
                "{}: {}",
                self.dir.display(),
                e
            ))),
        }
    }

    async fn deliver(&self, archive: &Path) -> Result<DeliveryReceipt, DeliveryError> {
        let file_name = archive
            .file_name()
            .ok_or_else(|| DeliveryError::ArchiveMissing {
                path: archive.to_path_buf(),
            })?;
        if !archive.is_file() {
            return Err(DeliveryError::ArchiveMissing {
                path: archive.to_path_buf(),
            });
        }

        let destination = self.dir.join(file_name);
        let mut staging = destination.clone().into_os_string();
        staging.push(".part");
        let staging = PathBuf::from(staging);

        let bytes = fs::copy(archive, &staging)
            .await
            .map_err(|e| DeliveryError::Transfer {
                path: archive.to_path_buf(),
                reason: e.to_string(),
            })?;

        let expected = sha256_file(archive).await?;
        let actual = sha256_file(&staging).await?;
        if expected != actual {
            let _ = fs::remove_file(&staging).await;
            return Err(DeliveryError::Mismatch {
                path: archive.to_path_buf(),
                expected,
                actual,
            });
        }
        fs::rename(&staging, &destination).await?;

        info!(destination = %destination.display(), bytes, "Archive copied");
        Ok(DeliveryReceipt {
            remote_path: destination.display().to_string(),
            bytes,
        })
    }

    async fn exists(&self, archive_name: &str) -> Result<bool, DeliveryError> {
        Ok(self.dir.join(archive_name).is_file())
    }
}
