use itertools::Itertools;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

pub type SnippetId = i64;

/// A stored code snippet and its practice counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(default)]
    pub id: SnippetId,
    pub title: String,
    pub code: String,
    /// Completed practice sessions
    #[serde(default)]
    pub test_count: u32,
    /// Cumulative milliseconds across completed sessions
    #[serde(default)]
    pub elapsed: u64,
}

impl Snippet {
    /// An unsaved snippet with zeroed counters
    pub fn new(title: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: 0,
            title: title.into(),
            code: code.into(),
            test_count: 0,
            elapsed: 0,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            code: row.get(2)?,
            test_count: row.get(3)?,
            elapsed: row.get(4)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("no snippet with id {0}")]
    NotFound(SnippetId),
}

/// CRUD access to snippet records
pub trait SnippetStore {
    /// Every snippet, ordered by id
    fn get_all(&self) -> Result<Vec<Snippet>, StoreError>;
    fn get(&self, id: SnippetId) -> Result<Option<Snippet>, StoreError>;
    /// Insert `snippet`, ignoring its `id`, and return the assigned id
    fn create(&self, snippet: &Snippet) -> Result<SnippetId, StoreError>;
    fn update(&self, snippet: &Snippet) -> Result<(), StoreError>;
    fn delete(&self, id: SnippetId) -> Result<(), StoreError>;

    /// Count one more completed session of `elapsed_ms` against `id`.
    fn record_completion(&self, id: SnippetId, elapsed_ms: u64) -> Result<Snippet, StoreError> {
        let mut snippet = self.get(id)?.ok_or(StoreError::NotFound(id))?;
        snippet.test_count += 1;
        snippet.elapsed += elapsed_ms;
        self.update(&snippet)?;
        Ok(snippet)
    }
}

/// SQLite-backed snippet store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened snippet database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS snippets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                code TEXT NOT NULL,
                test_count INTEGER NOT NULL DEFAULT 0,
                elapsed INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        Ok(Self { conn })
    }
}

impl SnippetStore for SqliteStore {
    fn get_all(&self) -> Result<Vec<Snippet>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, code, test_count, elapsed FROM snippets ORDER BY id")?;
        let rows = stmt.query_map([], Snippet::from_row)?;

        let mut snippets = Vec::new();
        for row in rows {
            snippets.push(row?);
        }
        Ok(snippets)
    }

    fn get(&self, id: SnippetId) -> Result<Option<Snippet>, StoreError> {
        let snippet = self
            .conn
            .query_row(
                "SELECT id, title, code, test_count, elapsed FROM snippets WHERE id = ?1",
                [id],
                Snippet::from_row,
            )
            .optional()?;
        Ok(snippet)
    }

    fn create(&self, snippet: &Snippet) -> Result<SnippetId, StoreError> {
        self.conn.execute(
            "INSERT INTO snippets (title, code, test_count, elapsed) VALUES (?1, ?2, ?3, ?4)",
            params![snippet.title, snippet.code, snippet.test_count, snippet.elapsed],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(id, title = %snippet.title, "snippet created");
        Ok(id)
    }

    fn update(&self, snippet: &Snippet) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE snippets SET title = ?1, code = ?2, test_count = ?3, elapsed = ?4 WHERE id = ?5",
            params![
                snippet.title,
                snippet.code,
                snippet.test_count,
                snippet.elapsed,
                snippet.id
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(snippet.id));
        }
        info!(id = snippet.id, "snippet updated");
        Ok(())
    }

    fn delete(&self, id: SnippetId) -> Result<(), StoreError> {
        let changed = self.conn.execute("DELETE FROM snippets WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }
        info!(id, "snippet deleted");
        Ok(())
    }
}

/// Canonical form for stored code: trailing whitespace trimmed from every
/// line, blank lines removed, lines joined with `\n`.
pub fn normalize_code(code: &str) -> String {
    code.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(snippets: &[(&str, &str)]) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        for (title, code) in snippets {
            store.create(&Snippet::new(*title, *code)).unwrap();
        }
        store
    }

    #[test]
    fn test_create_and_get() {
        let store = store_with(&[]);
        let id = store
            .create(&Snippet::new("binary search", "lo, hi = 0, n"))
            .unwrap();

        let loaded = store.get(id).unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.title, "binary search");
        assert_eq!(loaded.code, "lo, hi = 0, n");
        assert_eq!(loaded.test_count, 0);
        assert_eq!(loaded.elapsed, 0);
    }

    #[test]
    fn test_create_ignores_incoming_id() {
        let store = store_with(&[("first", "a")]);
        let mut snippet = Snippet::new("second", "b");
        snippet.id = 1;

        let id = store.create(&snippet).unwrap();
        assert_ne!(id, 1);
        assert_eq!(store.get_all().unwrap().len(), 2);
    }

    #[test]
    fn test_get_missing_is_none() {
        let store = store_with(&[]);
        assert_eq!(store.get(42).unwrap(), None);
    }

    #[test]
    fn test_get_all_is_ordered_by_id() {
        let store = store_with(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let titles: Vec<String> = store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_update() {
        let store = store_with(&[("a", "1")]);
        let mut snippet = store.get(1).unwrap().unwrap();
        snippet.title = "renamed".into();
        store.update(&snippet).unwrap();
        assert_eq!(store.get(1).unwrap().unwrap().title, "renamed");
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let store = store_with(&[]);
        let mut snippet = Snippet::new("ghost", "boo");
        snippet.id = 7;
        assert!(matches!(store.update(&snippet), Err(StoreError::NotFound(7))));
    }

    #[test]
    fn test_delete() {
        let store = store_with(&[("a", "1"), ("b", "2")]);
        store.delete(1).unwrap();
        assert_eq!(store.get(1).unwrap(), None);
        assert!(matches!(store.delete(1), Err(StoreError::NotFound(1))));
        assert_eq!(store.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_record_completion_accumulates() {
        let store = store_with(&[("a", "1")]);
        store.record_completion(1, 1_500).unwrap();
        let snippet = store.record_completion(1, 2_000).unwrap();

        assert_eq!(snippet.test_count, 2);
        assert_eq!(snippet.elapsed, 3_500);
        assert_eq!(store.get(1).unwrap().unwrap(), snippet);
    }

    #[test]
    fn test_record_completion_missing() {
        let store = store_with(&[]);
        assert!(matches!(
            store.record_completion(3, 500),
            Err(StoreError::NotFound(3))
        ));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rote.db");
        let store = SqliteStore::open(&path).unwrap();
        store.create(&Snippet::new("a", "b")).unwrap();
        drop(store);

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.get_all().unwrap().len(), 1);
    }

    #[test]
    fn test_normalize_code() {
        let raw = "def f():  \n\n\n    return 1\t\n\n";
        assert_eq!(normalize_code(raw), "def f():\n    return 1");
    }

    #[test]
    fn test_normalize_keeps_leading_indent_and_handles_crlf() {
        assert_eq!(normalize_code("a\r\n  b \r\n"), "a\n  b");
        assert_eq!(normalize_code("   \n\t\n"), "");
    }

    #[test]
    fn test_snippet_json_field_names() {
        let json = r#"{"id":3,"title":"t","code":"c","testCount":2,"elapsed":900}"#;
        let snippet: Snippet = serde_json::from_str(json).unwrap();
        assert_eq!(snippet.test_count, 2);
        assert_eq!(snippet.elapsed, 900);

        let bare: Snippet = serde_json::from_str(r#"{"title":"t","code":"c"}"#).unwrap();
        assert_eq!(bare, Snippet::new("t", "c"));
    }
}
