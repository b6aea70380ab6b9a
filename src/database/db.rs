//! SQLite-backed key-value storage for the flashcard store.
//!
//! Everything lives in one `key_values` table; each value is a JSON document
//! stored as text.

use super::KeyValueStore;
use crate::error::StorageError;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) the database file and ensures the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening sqlite store");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS key_values (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            (),
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored keys
    pub fn key_count(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM key_values", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl KeyValueStore for SqliteStore {
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM key_values WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set_item(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(value)?;
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute(
            "INSERT OR REPLACE INTO key_values (key, value) VALUES (?1, ?2)",
            params![key, text],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        conn.execute("DELETE FROM key_values WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_missing_key_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_item("studydock-decks").unwrap().is_none());
    }

    #[test]
    fn test_set_replaces_previous_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_item("k", &json!([1])).unwrap();
        store.set_item("k", &json!({"a": true})).unwrap();

        assert_eq!(store.get_item("k").unwrap(), Some(json!({"a": true})));
        assert_eq!(store.key_count().unwrap(), 1);
    }

    #[test]
    fn test_remove_item() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set_item("k", &json!("v")).unwrap();
        store.remove_item("k").unwrap();
        store.remove_item("k").unwrap();

        assert!(store.get_item("k").unwrap().is_none());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cards.sqlite3");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set_item("studydock-cards", &json!([{"id": "c1"}])).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("studydock-cards").unwrap(),
            Some(json!([{"id": "c1"}]))
        );
    }

    #[test]
    fn test_corrupt_text_is_json_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO key_values (key, value) VALUES ('k', 'not json')",
                (),
            )
            .unwrap();
        }

        assert!(matches!(store.get_item("k"), Err(StorageError::Json(_))));
    }
}
