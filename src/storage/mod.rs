//! SQLite-backed run state -- the update checkpoint and the latest figures
//! diagnostics, stored as two well-known keys in a small cache table.

pub mod schema;

use std::fmt;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OptionalExtension;
use thiserror::Error;

use crate::pipeline::FiguresRecord;

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Key holding the last-update checkpoint.
pub const CHECKPOINT_KEY: &str = "crimewatch:last-update";
/// Key holding the latest per-category figures diagnostics.
pub const FIGURES_KEY: &str = "crimewatch:figures";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache read failed for key '{key}': {message}")]
    Read { key: String, message: String },

    #[error("cache write failed for key '{key}': {message}")]
    Write { key: String, message: String },
}

impl CacheError {
    fn read(key: &str, err: impl fmt::Display) -> Self {
        Self::Read {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    fn write(key: &str, err: impl fmt::Display) -> Self {
        Self::Write {
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Narrow key-value view over the pool, plus typed accessors for the two
/// keys the pipeline uses. The storage medium is opaque to callers.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Read a raw value, `None` when the key has never been written.
    pub fn read(&self, key: &str) -> Result<Option<String>, CacheError> {
        let conn = self.pool.get().map_err(|e| CacheError::read(key, e))?;
        conn.query_row(
            "SELECT value FROM cache WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| CacheError::read(key, e))
    }

    /// Insert or overwrite a raw value.
    pub fn write(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let conn = self.pool.get().map_err(|e| CacheError::write(key, e))?;
        conn.execute(
            "INSERT INTO cache (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = datetime('now')",
            rusqlite::params![key, value],
        )
        .map_err(|e| CacheError::write(key, e))?;
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        let conn = self.pool.get().map_err(|e| CacheError::write(key, e))?;
        conn.execute("DELETE FROM cache WHERE key = ?1", rusqlite::params![key])
            .map_err(|e| CacheError::write(key, e))?;
        Ok(())
    }

    /// Timestamp of the last upstream dataset successfully processed.
    pub fn read_checkpoint(&self) -> Result<Option<DateTime<Utc>>, CacheError> {
        match self.read(CHECKPOINT_KEY)? {
            None => Ok(None),
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| CacheError::read(CHECKPOINT_KEY, e)),
        }
    }

    pub fn write_checkpoint(&self, timestamp: DateTime<Utc>) -> Result<(), CacheError> {
        self.write(CHECKPOINT_KEY, &timestamp.to_rfc3339())
    }

    /// Forget the checkpoint so the next run reprocesses the full window.
    pub fn clear_checkpoint(&self) -> Result<(), CacheError> {
        self.delete(CHECKPOINT_KEY)
    }

    /// Diagnostics from the most recent completed run, if any.
    pub fn read_figures(&self) -> Result<Option<FiguresRecord>, CacheError> {
        match self.read(FIGURES_KEY)? {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| CacheError::read(FIGURES_KEY, e)),
        }
    }

    pub fn write_figures(&self, record: &FiguresRecord) -> Result<(), CacheError> {
        let json =
            serde_json::to_string(record).map_err(|e| CacheError::write(FIGURES_KEY, e))?;
        self.write(FIGURES_KEY, &json)
    }
}
