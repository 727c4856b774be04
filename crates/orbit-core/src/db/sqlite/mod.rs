//! SQLite backend.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so readers never block the writer
//! - `busy_timeout` from [`StoreConfig`](crate::config::StoreConfig)
//! - `foreign_keys = ON` so index rows cannot outlive their task
//!
//! Every `update_entities` call runs in one `IMMEDIATE` transaction.

mod backend;
pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::StoreError;

/// Busy timeout used when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed [`DatabaseBackend`](super::DatabaseBackend).
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Option<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the store at `path`, apply runtime pragmas and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or
    /// opening, configuring or migrating the database fails.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut conn = Connection::open(path)?;
        configure_connection(&conn, busy_timeout)?;
        let version = migrations::migrate(&mut conn)?;
        tracing::debug!(path = %path.display(), version, "opened sqlite store");

        Ok(Self::from_connection(conn))
    }

    /// A private in-memory store, gone when the backend is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if migrating the fresh database fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn open(guard: &mut Option<Connection>) -> Result<&mut Connection, StoreError> {
    guard.as_mut().ok_or(StoreError::Closed)
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}
