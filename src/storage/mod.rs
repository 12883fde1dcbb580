//! Key-value storage gateway
//!
//! Everything Westline persists (accounts, the session pointer, conversation
//! lists, galleries) is a JSON string under a well-known key. Two backends
//! are provided: [`SqliteStore`] for the CLI and [`MemoryStore`] for tests
//! and embedding.

use crate::error::{Result, WestlineError};
use anyhow::Context;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub mod keys;

/// Synchronous string key-value store
///
/// Writes are last-write-wins; callers always rewrite whole values.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

/// Read and deserialize a JSON value, treating unreadable data as absent
///
/// A corrupt entry is logged and skipped rather than failing the caller,
/// so one bad entry never locks a user out.
pub fn read_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable value under {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Serialize and store a JSON value
pub fn write_json<T: serde::Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<()> {
    let raw = serde_json::to_string(value)
        .with_context(|| format!("Failed to serialize value for {}", key))?;
    store.set(key, &raw)
}

/// SQLite-backed store
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create a store in the user's data directory
    ///
    /// The `WESTLINE_DB` environment variable overrides the location.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("WESTLINE_DB") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "westline", "westline")
            .ok_or_else(|| WestlineError::Storage("Could not determine data directory".into()))?;

        Self::new_with_path(proj_dirs.data_dir().join("westline.db"))
    }

    /// Create a store backed by the given database file
    ///
    /// # Examples
    ///
    /// ```
    /// use westline::storage::{KeyValueStore, SqliteStore};
    ///
    /// let dir = std::env::temp_dir().join("westline-doc");
    /// let store = SqliteStore::new_with_path(dir.join("doc.db")).unwrap();
    /// store.set("greeting", "hello").unwrap();
    /// assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello"));
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| WestlineError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        tracing::debug!("Opened storage at {}", store.db_path.display());
        Ok(store)
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| WestlineError::Storage(e.to_string()).into())
    }

    fn init(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| WestlineError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.open()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to read value")
            .map_err(|e| WestlineError::Storage(e.to_string()))?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.open()?;
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .context("Failed to write value")
        .map_err(|e| WestlineError::Storage(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM kv WHERE key = ?", params![key])
            .context("Failed to delete value")
            .map_err(|e| WestlineError::Storage(e.to_string()))?;
        Ok(())
    }
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| WestlineError::Storage("Memory store lock poisoned".to_string()).into())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let store =
            SqliteStore::new_with_path(dir.path().join("westline.db")).expect("create store");
        (store, dir)
    }

    #[test]
    fn test_sqlite_store_init_creates_table() {
        let (store, _dir) = create_test_store();
        let conn = Connection::open(store.path()).expect("open connection");
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='kv'",
                [],
                |r| r.get(0),
            )
            .expect("query row");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_sqlite_set_overwrites_existing_value() {
        let (store, _dir) = create_test_store();
        store.set("k", "first").unwrap();
        store.set("k", "second").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_sqlite_get_missing_returns_none() {
        let (store, _dir) = create_test_store();
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_sqlite_remove_is_idempotent() {
        let (store, _dir) = create_test_store();
        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("westline.db");
        SqliteStore::new_with_path(&path)
            .unwrap()
            .set("k", "v")
            .unwrap();
        let reopened = SqliteStore::new_with_path(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_read_json_skips_corrupt_value() {
        let store = MemoryStore::new();
        store.set("bad", "{not json").unwrap();
        let value: Option<Vec<String>> = read_json(&store, "bad").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_write_then_read_json() {
        let store = MemoryStore::new();
        write_json(&store, "list", &vec!["a".to_string(), "b".to_string()]).unwrap();
        let value: Option<Vec<String>> = read_json(&store, "list").unwrap();
        assert_eq!(value.unwrap(), vec!["a", "b"]);
    }

    #[test]
    #[serial]
    fn test_new_respects_env_override() {
        let dir = tempdir().expect("failed to create tempdir");
        let db_path = dir.path().join("nested").join("westline.db");
        env::set_var("WESTLINE_DB", db_path.to_string_lossy().to_string());

        let store = SqliteStore::new().expect("new failed with env override");
        assert_eq!(store.path(), db_path.as_path());
        assert!(db_path.parent().unwrap().exists());

        env::remove_var("WESTLINE_DB");
    }
}
