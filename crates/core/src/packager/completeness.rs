//! Completeness test for a workspace.

use crate::fetcher::DocumentDescriptor;

/// How many of the listed documents are on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completeness {
    pub expected: usize,
    pub present: usize,
    pub missing: Vec<String>,
}

impl Completeness {
    pub fn is_complete(&self) -> bool {
        self.present == self.expected
    }
}

/// Counts the listed documents whose target file exists.
///
/// Only expected target paths are counted, so leftovers or unrelated files
/// in the workspace never make an incomplete case file look complete.
pub fn check_completeness(descriptors: &[DocumentDescriptor]) -> Completeness {
    let missing: Vec<String> = descriptors
        .iter()
        .filter(|d| !d.is_present())
        .map(|d| d.document_id.clone())
        .collect();

    Completeness {
        expected: descriptors.len(),
        present: descriptors.len() - missing.len(),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::casefile::{CaseFileId, Workspace};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stray_file_does_not_count() {
        let temp = TempDir::new().unwrap();
        let case_file = CaseFileId::parse("EX-2023-1- -GDEBA-A").unwrap();
        let ws = Workspace::new(temp.path(), &case_file);
        ws.ensure().await.unwrap();

        let ids: Vec<String> = vec!["D1".into(), "D2".into(), "D3".into()];
        let descriptors = DocumentDescriptor::from_listing(&ws, &ids);
        std::fs::write(ws.document_path("D1"), b"1").unwrap();
        std::fs::write(ws.document_path("D2"), b"2").unwrap();
        std::fs::write(ws.path().join("notes.txt"), b"stray").unwrap();

        let completeness = check_completeness(&descriptors);
        assert_eq!(completeness.expected, 3);
        assert_eq!(completeness.present, 2);
        assert_eq!(completeness.missing, vec!["D3".to_string()]);
        assert!(!completeness.is_complete());

        std::fs::write(ws.document_path("D3"), b"3").unwrap();
        assert!(check_completeness(&descriptors).is_complete());
    }

    #[test]
    fn test_directory_named_like_document_is_not_present() {
        let temp = TempDir::new().unwrap();
        let case_file = CaseFileId::parse("EX-2023-1- -GDEBA-A").unwrap();
        let ws = Workspace::new(temp.path(), &case_file);
        std::fs::create_dir_all(ws.document_path("D1")).unwrap();

        let descriptors = DocumentDescriptor::from_listing(&ws, &["D1".to_string()]);
        assert!(!check_completeness(&descriptors).is_complete());
    }
}
