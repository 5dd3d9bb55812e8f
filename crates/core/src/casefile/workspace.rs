//! Per-case staging directory.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::CaseFileId;

/// Suffix of documents that are still being written.
pub const PART_SUFFIX: &str = "part";

/// Extension of fetched documents.
const DOCUMENT_EXTENSION: &str = "pdf";

/// Local staging directory for one case file.
///
/// Lives at `<downloads_dir>/<case file>/`; the packaged archive is written
/// next to it as `<downloads_dir>/<case file>.zip`.
#[derive(Debug, Clone)]
pub struct Workspace {
    case_file: CaseFileId,
    root: PathBuf,
    archive_path: PathBuf,
}

impl Workspace {
    /// Describes the workspace of `case_file` without touching the disk.
    pub fn new(downloads_dir: &Path, case_file: &CaseFileId) -> Self {
        Self {
            case_file: case_file.clone(),
            root: downloads_dir.join(case_file.as_str()),
            archive_path: downloads_dir.join(case_file.archive_name()),
        }
    }

    pub fn case_file(&self) -> &CaseFileId {
        &self.case_file
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Final path of a document inside the workspace.
    pub fn document_path(&self, document_id: &str) -> PathBuf {
        let file_name: String = document_id
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(format!("{}.{}", file_name, DOCUMENT_EXTENSION))
    }

    /// Creates the directory if absent. An existing workspace is kept as is.
    pub async fn ensure(&self) -> io::Result<()> {
        if !self.exists() {
            debug!(case_file = %self.case_file, path = %self.root.display(), "Creating workspace");
        }
        fs::create_dir_all(&self.root).await
    }

    /// Removes `*.part` leftovers of an interrupted run. Returns how many were removed.
    pub async fn sweep_partials(&self) -> io::Result<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_part = path.extension().and_then(|e| e.to_str()) == Some(PART_SUFFIX);
            if is_part && entry.file_type().await?.is_file() {
                fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(case_file = %self.case_file, removed, "Removed partial documents");
        }
        Ok(removed)
    }

    /// Deletes the workspace directory and everything in it.
    pub async fn remove(&self) -> io::Result<()> {
        fs::remove_dir_all(&self.root).await
    }
}
