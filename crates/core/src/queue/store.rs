//! Queue storage trait and types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue table has not been created yet (nothing was ever loaded).
    #[error("Case file queue is not initialized; load a CSV first")]
    NotInitialized,
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
    /// Reading the import file failed.
    #[error("Failed to read import file: {0}")]
    Import(String),
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        QueueError::Database(e.to_string())
    }
}

/// Processing status of a queued case file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseFileStatus {
    Pending,
    Completed,
}

impl CaseFileStatus {
    /// Value stored in the `status` column.
    pub fn code(self) -> i64 {
        match self {
            CaseFileStatus::Pending => 0,
            CaseFileStatus::Completed => 1,
        }
    }

    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            CaseFileStatus::Pending
        } else {
            CaseFileStatus::Completed
        }
    }
}

/// A queued case file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseFileRecord {
    pub identifier: String,
    pub status: CaseFileStatus,
}

/// Trait for case-file queue backends.
///
/// Identifiers are stored as given; validation happens when a case file is
/// processed so malformed rows are reported instead of silently dropped.
pub trait WorkQueueStore: Send + Sync {
    /// Replace the whole queue with `identifiers`, all pending.
    /// Duplicates keep their first position. Returns the number stored.
    fn load(&self, identifiers: &[String]) -> Result<usize, QueueError>;

    /// Pending identifiers in load order.
    fn list_pending(&self) -> Result<Vec<String>, QueueError>;

    /// Mark an identifier completed. Completing twice is a no-op.
    fn mark_completed(&self, identifier: &str) -> Result<(), QueueError>;

    /// Number of pending identifiers; 0 when the queue was never loaded.
    fn count_pending(&self) -> usize;

    /// Every record in load order.
    fn records(&self) -> Result<Vec<CaseFileRecord>, QueueError>;
}
