//! Per-case-file processing.
//!
//! [`CaseProcessor`] takes one queued identifier through validation,
//! listing, concurrent fetching, the completeness check, packaging and
//! workspace cleanup, and reports the terminal [`CaseState`]. It never
//! delivers archives or touches the queue; the run controller does that
//! for case files that reach [`CaseState::CleanedUp`].

mod case;
mod types;

pub use case::CaseProcessor;
pub use types::{CaseReport, CaseState};
