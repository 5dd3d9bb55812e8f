//! CSV import for the `load` command.

use std::path::Path;

use super::QueueError;

/// Reads the first column of every non-empty row of a header-less CSV file.
pub fn read_identifiers_csv(path: &Path) -> Result<Vec<String>, QueueError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| QueueError::Import(format!("{}: {}", path.display(), e)))?;

    let mut identifiers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| QueueError::Import(e.to_string()))?;
        match record.get(0) {
            Some(value) if !value.is_empty() => identifiers.push(value.to_string()),
            _ => {}
        }
    }
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_reads_first_column() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "EX-2023-1- -GDEBA-A\n\"EX-2023-2- -GDEBA-B\",extra\n\n  EX-2023-3- -GDEBA-C  \n"
        )
        .unwrap();

        let ids = read_identifiers_csv(file.path()).unwrap();
        assert_eq!(
            ids,
            vec![
                "EX-2023-1- -GDEBA-A".to_string(),
                "EX-2023-2- -GDEBA-B".to_string(),
                "EX-2023-3- -GDEBA-C".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_file() {
        let err = read_identifiers_csv(Path::new("/nonexistent/ids.csv")).unwrap_err();
        assert!(matches!(err, QueueError::Import(_)));
    }
}
