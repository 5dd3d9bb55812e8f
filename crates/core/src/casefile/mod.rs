//! Case-file identifiers and their local workspaces.
//!
//! A [`CaseFileId`] can only be built from a string matching the GDEBA
//! grammar `EX-<year>-<number>- -GDEBA-<office>`, so every component that
//! receives one can skip validation. A [`Workspace`] is the staging directory
//! where the documents of one case file are downloaded before packaging.

mod id;
mod workspace;

pub use id::{CaseFileId, ValidationError};
pub use workspace::{Workspace, PART_SUFFIX};
