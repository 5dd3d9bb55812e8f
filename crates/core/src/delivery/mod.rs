//! Delivery of packaged archives to the remote storage endpoint.

mod error;
mod local;
mod sftp;
mod traits;

pub use error::DeliveryError;
pub use local::LocalDirDelivery;
pub use sftp::SftpDelivery;
pub use traits::{DeliveryClient, DeliveryReceipt};

use std::sync::Arc;

use crate::config::{DeliveryBackend, DeliveryConfig};

/// Factory function to create the delivery client selected in config
pub fn create_delivery_client(
    config: &DeliveryConfig,
) -> Result<Arc<dyn DeliveryClient>, DeliveryError> {
    match config.backend {
        DeliveryBackend::Sftp => {
            let sftp = config.sftp.clone().ok_or_else(|| {
                DeliveryError::Configuration("missing [delivery.sftp] section".to_string())
            })?;
            Ok(Arc::new(SftpDelivery::new(sftp)))
        }
        DeliveryBackend::Local => {
            let local = config.local.as_ref().ok_or_else(|| {
                DeliveryError::Configuration("missing [delivery.local] section".to_string())
            })?;
            Ok(Arc::new(LocalDirDelivery::new(local.dir.clone())))
        }
    }
}
