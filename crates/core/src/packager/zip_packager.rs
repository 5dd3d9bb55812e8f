//! Zip packager implementation.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::error::PackagingError;

/// Highest deflate level.
const MAX_DEFLATE_LEVEL: i64 = 9;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// A packaged workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagedArchive {
    pub path: PathBuf,
    /// Number of files stored.
    pub entries: usize,
    /// Archive size on disk.
    pub bytes: u64,
    /// Hex SHA-256 of the archive.
    pub sha256: String,
}

/// Compresses workspaces into sibling zip archives.
#[derive(Debug, Clone)]
pub struct ArchivePackager {
    compression_level: i64,
}

impl Default for ArchivePackager {
    fn default() -> Self {
        Self {
            compression_level: MAX_DEFLATE_LEVEL,
        }
    }
}

/// `<workspace>.zip`, next to the workspace directory.
pub fn archive_path_for(workspace: &Path) -> PathBuf {
    let mut name = workspace.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

impl ArchivePackager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes every regular file under `workspace` into `<workspace>.zip`.
    ///
    /// Entry names are relative to the workspace root. On failure the
    /// partial archive is removed and the workspace is left untouched.
    pub async fn compress(&self, workspace: &Path) -> Result<PackagedArchive, PackagingError> {
        if !workspace.is_dir() {
            return Err(PackagingError::WorkspaceMissing {
                path: workspace.to_path_buf(),
            });
        }

        let archive = archive_path_for(workspace);
        let level = self.compression_level;
        let (src, dst) = (workspace.to_path_buf(), archive.clone());
        let written = tokio::task::spawn_blocking(move || write_archive(&src, &dst, level))
            .await
            .map_err(|e| PackagingError::Task(e.to_string()));

        let entries = match written {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) | Err(e) => {
                discard_partial(&archive);
                return Err(e);
            }
        };

        let bytes = tokio::fs::metadata(&archive).await?.len();
        let sha256 = sha256_file(&archive).await?;
        info!(
            archive = %archive.display(),
            entries,
            bytes,
            "Workspace packaged"
        );

        Ok(PackagedArchive {
            path: archive,
            entries,
            bytes,
            sha256,
        })
    }

    /// Deletes the workspace directory once its archive exists.
    pub async fn cleanup(&self, workspace: &Path) -> Result<(), PackagingError> {
        tokio::fs::remove_dir_all(workspace)
            .await
            .map_err(|e| PackagingError::Cleanup {
                path: workspace.to_path_buf(),
                source: e,
            })?;
        debug!(workspace = %workspace.display(), "Workspace removed");
        Ok(())
    }
}

fn write_archive(workspace: &Path, archive: &Path, level: i64) -> Result<usize, PackagingError> {
    let file = File::create(archive).map_err(|e| PackagingError::CreateArchive {
        path: archive.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(level))
        .large_file(true);

    let mut entries = 0;
    for entry in WalkDir::new(workspace).sort_by_file_name() {
        let entry = entry.map_err(|e| PackagingError::Walk(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry_name(workspace, entry.path())?;
        let mut source = File::open(entry.path())
            .map(BufReader::new)
            .map_err(|e| PackagingError::ReadFile {
                path: entry.path().to_path_buf(),
                source: e,
            })?;

        zip.start_file(name, options)?;
        io::copy(&mut source, &mut zip).map_err(|e| PackagingError::ReadFile {
            path: entry.path().to_path_buf(),
            source: e,
        })?;
        entries += 1;
    }

    zip.finish()?;
    Ok(entries)
}

/// Zip entry name: path relative to the workspace, `/`-separated.
fn entry_name(workspace: &Path, path: &Path) -> Result<String, PackagingError> {
    let relative = path
        .strip_prefix(workspace)
        .map_err(|e| PackagingError::Walk(format!("{}: {}", path.display(), e)))?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

fn discard_partial(archive: &Path) {
    match std::fs::remove_file(archive) {
        Ok(()) => warn!(archive = %archive.display(), "Removed partial archive"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(archive = %archive.display(), error = %e, "Failed to remove partial archive"),
    }
}

/// Hex SHA-256 of a file.
pub async fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn read_entries(archive: &Path) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(File::open(archive).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut file = zip.by_index(i).unwrap();
            assert_eq!(file.compression(), CompressionMethod::Deflated);
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            entries.push((file.name().to_string(), content));
        }
        entries
    }

    #[tokio::test]
    async fn test_compress_then_cleanup() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("EX-2023-1- -GDEBA-A");
        std::fs::create_dir_all(workspace.join("anexos")).unwrap();
        std::fs::write(workspace.join("IF-1.pdf"), b"%PDF-1.4 one").unwrap();
        std::fs::write(workspace.join("anexos/IF-2.pdf"), b"%PDF-1.4 two").unwrap();

        let packager = ArchivePackager::new();
        let archive = packager.compress(&workspace).await.unwrap();
        assert_eq!(archive.path, temp.path().join("EX-2023-1- -GDEBA-A.zip"));
        assert_eq!(archive.entries, 2);
        assert_eq!(archive.sha256.len(), 64);

        let entries = read_entries(&archive.path);
        assert_eq!(
            entries,
            vec![
                ("IF-1.pdf".to_string(), b"%PDF-1.4 one".to_vec()),
                ("anexos/IF-2.pdf".to_string(), b"%PDF-1.4 two".to_vec()),
            ]
        );

        packager.cleanup(&workspace).await.unwrap();
        let remaining: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(remaining, vec![std::ffi::OsString::from("EX-2023-1- -GDEBA-A.zip")]);
    }

    #[tokio::test]
    async fn test_missing_workspace() {
        let temp = TempDir::new().unwrap();
        let err = ArchivePackager::new()
            .compress(&temp.path().join("absent"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackagingError::WorkspaceMissing { .. }));
        assert!(!temp.path().join("absent.zip").exists());
    }

    #[tokio::test]
    async fn test_failure_removes_partial_archive_and_keeps_workspace() {
        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("ws");
        std::fs::create_dir_all(&workspace).unwrap();
        std::fs::write(workspace.join("IF-1.pdf"), b"data").unwrap();
        // a directory squatting on the archive path makes creation fail
        std::fs::create_dir_all(temp.path().join("ws.zip")).unwrap();

        let err = ArchivePackager::new().compress(&workspace).await.unwrap_err();
        assert!(matches!(err, PackagingError::CreateArchive { .. }));
        assert!(workspace.join("IF-1.pdf").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_fails_cleanly() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let workspace = temp.path().join("ws");
        std::fs::create_dir_all(&workspace).unwrap();
        let locked = workspace.join("IF-1.pdf");
        std::fs::write(&locked, b"data").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores file permissions
        if File::open(&locked).is_ok() {
            return;
        }

        let err = ArchivePackager::new().compress(&workspace).await.unwrap_err();
        assert!(matches!(err, PackagingError::ReadFile { .. }));
        assert!(!temp.path().join("ws.zip").exists());
        assert!(locked.exists());
    }

    #[tokio::test]
    async fn test_cleanup_of_missing_workspace_fails() {
        let temp = TempDir::new().unwrap();
        let err = ArchivePackager::new()
            .cleanup(&temp.path().join("gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackagingError::Cleanup { .. }));
    }

    #[test]
    fn test_archive_path_for() {
        assert_eq!(
            archive_path_for(Path::new("/data/EX-2023-1- -GDEBA-A")),
            PathBuf::from("/data/EX-2023-1- -GDEBA-A.zip")
        );
    }
}
