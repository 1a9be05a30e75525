//! The record store handle passed to every component.

use std::path::Path;

use super::connection::Database;
use super::files::{
    count_file_records, delete_file_record, get_file_record, get_fingerprint, list_fingerprints,
    upsert_file_record,
};
use super::models::{FileRecord, StoredFingerprint};
use super::schema::{migrate, verify_schema, SCHEMA_VERSION};
use crate::Result;

/// Durable mapping from relative path to its last summarized record.
///
/// Every write runs in its own immediate transaction on a synchronous
/// connection, so a record is on disk before the call returns and readers
/// never observe a half-written row.
#[derive(Clone, Debug)]
pub struct RecordStore {
    db: Database,
}

impl RecordStore {
    /// Open the store at `location` and create the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn initialize(location: impl AsRef<Path>) -> Result<Self> {
        Self::from_database(Database::open(location)?)
    }

    /// Open a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?)
    }

    /// Wrap an open database, running migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if migrations or schema verification fail.
    pub fn from_database(db: Database) -> Result<Self> {
        db.with_conn(|conn| {
            migrate(conn)?;
            verify_schema(conn)
        })?;
        tracing::info!(location = %db, version = SCHEMA_VERSION, "Record store ready");
        Ok(Self { db })
    }

    /// Insert or replace the record for its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is not committed.
    pub fn put(&self, record: &FileRecord) -> Result<()> {
        self.db
            .with_transaction(|conn| upsert_file_record(conn, record))?;
        tracing::debug!(path = %record.path, hash = %record.content_hash, "Record stored");
        Ok(())
    }

    /// Every stored fingerprint, without summary text.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_all(&self) -> Result<Vec<StoredFingerprint>> {
        self.db.with_conn(list_fingerprints)
    }

    /// Full record for `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        self.db.with_conn(|conn| get_file_record(conn, path))
    }

    /// Stored fingerprint for `path`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn fingerprint(&self, path: &str) -> Result<Option<StoredFingerprint>> {
        self.db.with_conn(|conn| get_fingerprint(conn, path))
    }

    /// Remove the record for `path`; absent paths are a no-op.
    ///
    /// Returns whether a record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete is not committed.
    pub fn remove(&self, path: &str) -> Result<bool> {
        let removed = self
            .db
            .with_transaction(|conn| delete_file_record(conn, path))?;
        if removed {
            tracing::debug!(path, "Record removed");
        }
        Ok(removed)
    }

    /// Number of tracked paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<i64> {
        self.db.with_conn(count_file_records)
    }

    /// Underlying database handle.
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}
