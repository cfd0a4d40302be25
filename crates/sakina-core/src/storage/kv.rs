//! SQLite-backed key/value store.
//!
//! This is the enforcement agent's storage layer: a single flat `kv` table
//! with no schema of its own beyond that. The sync bridge writes entries,
//! the agent reads them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::error::AgentStoreError;

/// One entry in a batch write. `None` removes the key.
pub type KvEntry<'a> = (&'a str, Option<String>);

/// SQLite key/value store.
pub struct KvStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl KvStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the parent directory cannot be created or the
    /// database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, AgentStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|source| AgentStoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        // Readers in the agent process and the writer in the app process can
        // overlap; let SQLite wait briefly instead of failing immediately.
        conn.busy_timeout(std::time::Duration::from_millis(250))?;
        let store = Self {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self, AgentStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn, path: None };
        store.migrate()?;
        Ok(store)
    }

    /// Location on disk, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
    }

    /// Get a value.
    pub fn get(&self, key: &str) -> Result<Option<String>, AgentStoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Get several values with one statement, so the result reflects a
    /// single committed state of the table. Missing keys are absent from the
    /// map.
    pub fn read_batch(&self, keys: &[&str]) -> Result<HashMap<String, String>, AgentStoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; keys.len()].join(", ");
        let sql = format!("SELECT key, value FROM kv WHERE key IN ({placeholders})");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(keys.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let values = rows.collect::<Result<HashMap<_, _>, _>>()?;
        Ok(values)
    }

    /// Set a value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), AgentStoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a value. Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), AgentStoreError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Apply several writes in one transaction so a concurrent reader sees
    /// either all of them or none.
    pub fn write_batch(&mut self, entries: &[KvEntry<'_>]) -> Result<(), AgentStoreError> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            match value {
                Some(value) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                        params![key, value],
                    )?;
                }
                None => {
                    tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
