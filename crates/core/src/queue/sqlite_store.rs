//! SQLite-backed case-file queue.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{CaseFileRecord, CaseFileStatus, QueueError, WorkQueueStore};

/// SQLite-backed case-file queue.
///
/// The `case_files` table is only created by [`WorkQueueStore::load`], so a
/// database that was never loaded reports zero pending items.
pub struct SqliteQueueStore {
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    /// Open (or create) the database file.
    pub fn new(path: &Path) -> Result<Self, QueueError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Database("connection lock poisoned".to_string()))
    }

    fn table_exists(conn: &Connection) -> Result<bool, QueueError> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'case_files'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn require_table(conn: &Connection) -> Result<(), QueueError> {
        if Self::table_exists(conn)? {
            Ok(())
        } else {
            Err(QueueError::NotInitialized)
        }
    }
}

impl WorkQueueStore for SqliteQueueStore {
    fn load(&self, identifiers: &[String]) -> Result<usize, QueueError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS case_files (
                identifier TEXT NOT NULL,
                status INTEGER NOT NULL DEFAULT 0
            );
            DELETE FROM case_files;
            "#,
        )?;

        let mut seen = HashSet::new();
        {
            let mut insert =
                tx.prepare("INSERT INTO case_files (identifier, status) VALUES (?, 0)")?;
            for identifier in identifiers {
                if seen.insert(identifier.as_str()) {
                    insert.execute(params![identifier])?;
                }
            }
        }
        tx.commit()?;

        let skipped = identifiers.len() - seen.len();
        if skipped > 0 {
            warn!(skipped, "Dropped duplicate identifiers while loading queue");
        }
        debug!(loaded = seen.len(), "Case file queue replaced");
        Ok(seen.len())
    }

    fn list_pending(&self) -> Result<Vec<String>, QueueError> {
        let conn = self.conn()?;
        Self::require_table(&conn)?;

        let mut stmt =
            conn.prepare("SELECT identifier FROM case_files WHERE status = 0 ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }

    fn mark_completed(&self, identifier: &str) -> Result<(), QueueError> {
        let conn = self.conn()?;
        Self::require_table(&conn)?;

        conn.execute(
            "UPDATE case_files SET status = ? WHERE identifier = ?",
            params![CaseFileStatus::Completed.code(), identifier],
        )?;
        Ok(())
    }

    fn count_pending(&self) -> usize {
        let result = self.conn().and_then(|conn| {
            if !Self::table_exists(&conn)? {
                return Ok(0);
            }
            let count: i64 =
                conn.query_row("SELECT count(*) FROM case_files WHERE status = 0", [], |row| {
                    row.get(0)
                })?;
            Ok(count as usize)
        });

        match result {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Failed to count pending case files");
                0
            }
        }
    }

    fn records(&self) -> Result<Vec<CaseFileRecord>, QueueError> {
        let conn = self.conn()?;
        Self::require_table(&conn)?;

        let mut stmt = conn.prepare("SELECT identifier, status FROM case_files ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(CaseFileRecord {
                identifier: row.get(0)?,
                status: CaseFileStatus::from_code(row.get(1)?),
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_count_pending_before_load_is_zero() {
        let store = SqliteQueueStore::in_memory().unwrap();
        assert_eq!(store.count_pending(), 0);
        assert!(matches!(
            store.list_pending().unwrap_err(),
            QueueError::NotInitialized
        ));
    }

    #[test]
    fn test_load_replaces_previous_content() {
        let store = SqliteQueueStore::in_memory().unwrap();
        store.load(&ids(&["A", "B", "C"])).unwrap();
        store.mark_completed("A").unwrap();

        let loaded = store.load(&ids(&["D", "E"])).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(store.list_pending().unwrap(), ids(&["D", "E"]));
        assert_eq!(store.records().unwrap().len(), 2);
    }

    #[test]
    fn test_load_drops_duplicates_keeping_order() {
        let store = SqliteQueueStore::in_memory().unwrap();
        let loaded = store.load(&ids(&["B", "A", "B", "C", "A"])).unwrap();
        assert_eq!(loaded, 3);
        assert_eq!(store.list_pending().unwrap(), ids(&["B", "A", "C"]));
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let store = SqliteQueueStore::in_memory().unwrap();
        store.load(&ids(&["A", "B"])).unwrap();

        store.mark_completed("A").unwrap();
        store.mark_completed("A").unwrap();
        store.mark_completed("unknown").unwrap();

        assert_eq!(store.list_pending().unwrap(), ids(&["B"]));
        assert_eq!(store.count_pending(), 1);
        let records = store.records().unwrap();
        assert_eq!(records[0].status, CaseFileStatus::Completed);
        assert_eq!(records[1].status, CaseFileStatus::Pending);
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("queue.db");
        {
            let store = SqliteQueueStore::new(&path).unwrap();
            store.load(&ids(&["A", "B"])).unwrap();
            store.mark_completed("B").unwrap();
        }
        let store = SqliteQueueStore::new(&path).unwrap();
        assert_eq!(store.list_pending().unwrap(), ids(&["A"]));
    }
}
