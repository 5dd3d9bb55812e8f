//! Bounded-concurrency document fetching.
//!
//! [`ConcurrentDocumentFetcher`] downloads every document of a case file
//! whose target file is missing from the workspace. At most
//! `max_concurrent` fetches are in flight at once; failures are counted
//! against a run-wide [`ErrorBudget`] and never cancel sibling fetches.
//! Once the budget is exceeded no further fetch is started, the ones
//! already running finish, and the report comes back marked as aborted.

mod budget;
mod pool;
mod types;

pub use budget::ErrorBudget;
pub use pool::ConcurrentDocumentFetcher;
pub use types::{
    DocumentDescriptor, DocumentOutcome, FetchError, FetchOutcome, FetchReport, SkipReason,
};
