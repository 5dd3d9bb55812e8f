//! Batch run over the case-file queue.
//!
//! The [`RunController`] refuses to start unless the delivery endpoint is
//! reachable, then processes pending case files one at a time. Only a case
//! file whose archive was delivered is marked completed; everything else
//! stays pending for the next run. Exceeding the run's error budget stops
//! the run at the case file where it happened.

mod controller;
mod types;

pub use controller::RunController;
pub use types::{RunError, RunProgress, RunProgressCallback, RunSummary};
