//! Error types for the delivery module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while delivering an archive.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint could not be reached or refused the session.
    #[error("Delivery endpoint unreachable: {0}")]
    Unreachable(String),

    /// Credentials were rejected.
    #[error("Delivery authentication failed: {0}")]
    Authentication(String),

    /// The local archive does not exist.
    #[error("Archive not found: {path}")]
    ArchiveMissing { path: PathBuf },

    /// Upload failed mid-transfer.
    #[error("Failed to transfer {path}: {reason}")]
    Transfer { path: PathBuf, reason: String },

    /// Delivered copy does not match the local archive.
    #[error("Delivered copy of {path} does not match: expected {expected}, got {actual}")]
    Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Client is misconfigured.
    #[error("Delivery configuration error: {0}")]
    Configuration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
