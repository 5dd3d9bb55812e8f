//! Durable queue of case files waiting to be processed.

mod import;
mod sqlite_store;
mod store;

pub use import::read_identifiers_csv;
pub use sqlite_store::SqliteQueueStore;
pub use store::{CaseFileRecord, CaseFileStatus, QueueError, WorkQueueStore};
