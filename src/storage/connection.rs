//! Durable `SQLite` handle behind the record store.
//!
//! One connection guarded by a `parking_lot::Mutex` serializes every
//! statement, so two writers can never interleave inside a record. WAL with
//! `synchronous = FULL` makes each commit durable before the call returns.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};

use crate::error::StorageError;
use crate::Result;

const DURABILITY_PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = FULL;
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

/// Shared handle to the record-store database.
///
/// Clones share one connection, which closes when the last clone drops.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: Location,
}

impl Database {
    /// Open (or create) the database file, creating missing parent
    /// directories such as the metadata directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or database cannot be created or the
    /// durability settings cannot be applied.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = Connection::open(path).map_err(|e| {
            StorageError::Database(format!("cannot open '{}': {e}", path.display()))
        })?;
        Self::configure(conn, Location::File(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Database(format!("cannot open in-memory store: {e}")))?;
        Self::configure(conn, Location::Memory)
    }

    fn configure(conn: Connection, location: Location) -> Result<Self> {
        conn.execute_batch(DURABILITY_PRAGMAS)
            .map_err(|e| StorageError::Database(format!("cannot apply pragmas: {e}")))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        };
        tracing::debug!(location = %db, "Record store database opened");
        Ok(db)
    }

    /// Run `f` while holding the connection.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        f(&self.conn.lock())
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken up front. If `f` fails the transaction is
    /// rolled back when dropped, so the previous row stays intact.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot start or commit, or if `f`
    /// fails.
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(format!("cannot begin write: {e}")))?;

        let value = f(&tx)?;
        tx.commit()
            .map_err(|e| StorageError::Database(format!("cannot commit write: {e}")))?;
        Ok(value)
    }

    /// Database file, or `None` when in memory.
    #[must_use]
    pub fn file_path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Location::File(path) => write!(f, "{}", path.display()),
            Location::Memory => f.write_str(":memory:"),
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
