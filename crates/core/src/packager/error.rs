//! Error types for the packager module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while packaging a workspace.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// Workspace directory does not exist.
    #[error("Workspace not found: {path}")]
    WorkspaceMissing { path: PathBuf },

    /// Archive file could not be created.
    #[error("Failed to create archive {path}")]
    CreateArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workspace file could not be read.
    #[error("Failed to read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Walking the workspace failed.
    #[error("Failed to walk workspace: {0}")]
    Walk(String),

    /// Zip encoder error.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed to delete the workspace after packaging.
    #[error("Failed to remove workspace {path}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Blocking packaging task failed.
    #[error("Packaging task failed: {0}")]
    Task(String),
}
