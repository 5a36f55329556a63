//! SQLite-backed key/value store.
//!
//! The database location comes from the caller, usually the configured
//! `paths.database_path`.

use super::KeyValueStore;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS kv_store (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);
";

/// Key/value store over a single SQLite table.
///
/// Thread-safe via internal Mutex. All operations acquire the lock.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at a specific path.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        Self::init(conn)
    }

    /// In-memory database, discarded on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{HISTORY_KEY, PRESETS_KEY, PersistentStore};
    use crate::types::Preset;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();

        assert_eq!(store.load("missing").unwrap(), None);
        store.save("k", "v1").unwrap();
        store.save("k", "v2").unwrap();
        assert_eq!(store.load("k").unwrap(), Some("v2".to_string()));
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("opsdeck.db");
        let preset = Preset::new("render status");

        {
            let store = SqliteStore::open_path(&path).unwrap();
            store.set(PRESETS_KEY, &vec![preset.clone()]).unwrap();
        }

        let store = SqliteStore::open_path(&path).unwrap();
        let presets: Vec<Preset> = store.get(PRESETS_KEY, Vec::new());
        assert_eq!(presets, vec![preset]);
    }

    #[test]
    fn test_corrupt_value_falls_back_to_default() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.save(HISTORY_KEY, "[{\"id\":").unwrap();

        let history: Vec<Preset> = store.get(HISTORY_KEY, Vec::new());
        assert!(history.is_empty());
    }
}
