//! SQLite-backed key-value persistence.
//!
//! The browser original kept four flat keys in extension-local storage;
//! this layer preserves that shape: one `kv` table of JSON values,
//! last-write-wins, one transaction per write batch. Uses r2d2 connection
//! pooling so readers never block each other.

use std::collections::HashMap;
use std::path::Path;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::history::HistoryLog;
use crate::models::{FlatRecord, IndexSnapshot, Settings, SnapshotMeta};

/// Persisted key for the flattened record list.
pub const KEY_RECORDS: &str = "findexData";
/// Persisted key for snapshot metadata.
pub const KEY_META: &str = "findexMeta";
/// Persisted key for user settings.
pub const KEY_SETTINGS: &str = "findexSettings";
/// Persisted key for the query history log.
pub const KEY_HISTORY: &str = "findexHistory";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Thread-safe key-value store over a pooled SQLite connection.
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open or create the store at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;",
            )?;
            Ok(())
        });
        let pool = Pool::builder().max_size(4).build(manager)?;
        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    /// In-memory store (for testing).
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();
        // In-memory needs a single connection to keep its state
        let pool = Pool::builder().max_size(1).build(manager)?;
        let db = Self { pool };
        db.setup_schema()?;
        Ok(db)
    }

    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    // ── Generic key-value access ─────────────────────────────────

    /// Fetch several keys at once. Missing keys are absent from the result.
    pub fn get(&self, keys: &[&str]) -> DatabaseResult<HashMap<String, Value>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut out = HashMap::with_capacity(keys.len());
        for &key in keys {
            let raw: Option<String> = stmt.query_row(params![key], |row| row.get(0)).optional()?;
            if let Some(raw) = raw {
                out.insert(key.to_string(), serde_json::from_str(&raw)?);
            }
        }
        Ok(out)
    }

    /// Write several keys in one transaction. Last write wins.
    pub fn set(&self, entries: &[(&str, Value)]) -> DatabaseResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )?;
            for (key, value) in entries {
                stmt.execute(params![key, value.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_typed<T: DeserializeOwned>(&self, key: &str) -> DatabaseResult<Option<T>> {
        let conn = self.get_conn()?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(Into::into)
    }

    fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> DatabaseResult<()> {
        self.set(&[(key, serde_json::to_value(value)?)])
    }

    // ── Typed helpers for the four persisted keys ────────────────

    /// Persist a snapshot: records and meta, one transaction.
    pub fn save_snapshot(&self, snapshot: &IndexSnapshot) -> DatabaseResult<()> {
        self.set(&[
            (KEY_RECORDS, serde_json::to_value(snapshot.records())?),
            (KEY_META, serde_json::to_value(snapshot.meta())?),
        ])
    }

    /// Load the persisted snapshot, if any. A missing or stale meta `count`
    /// is normalized against the stored record list.
    pub fn load_snapshot(&self) -> DatabaseResult<Option<IndexSnapshot>> {
        let Some(records) = self.get_typed::<Vec<FlatRecord>>(KEY_RECORDS)? else {
            return Ok(None);
        };
        let meta = self.get_typed::<SnapshotMeta>(KEY_META)?.unwrap_or(SnapshotMeta {
            count: 0,
            synced_at: chrono::DateTime::UNIX_EPOCH,
        });
        Ok(Some(IndexSnapshot::from_parts(records, meta)))
    }

    pub fn save_settings(&self, settings: &Settings) -> DatabaseResult<()> {
        self.set_typed(KEY_SETTINGS, settings)
    }

    pub fn load_settings(&self) -> DatabaseResult<Settings> {
        Ok(self.get_typed(KEY_SETTINGS)?.unwrap_or_default())
    }

    pub fn save_history(&self, history: &HistoryLog) -> DatabaseResult<()> {
        self.set_typed(KEY_HISTORY, history)
    }

    pub fn load_history(&self) -> DatabaseResult<HistoryLog> {
        Ok(self.get_typed(KEY_HISTORY)?.unwrap_or_default())
    }
}
