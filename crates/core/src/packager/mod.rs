//! Packaging of complete workspaces.
//!
//! A workspace is packaged once every document of its listing is present:
//! [`check_completeness`] decides that, [`ArchivePackager`] writes the
//! deflated `<case file>.zip` next to the workspace, and
//! [`ArchivePackager::cleanup`] removes the raw directory afterwards.

mod completeness;
mod error;
mod zip_packager;

pub use completeness::{check_completeness, Completeness};
pub use error::PackagingError;
pub use zip_packager::{archive_path_for, sha256_file, ArchivePackager, PackagedArchive};
