//! `SQLite` record store.
//!
//! One row per summarized file, keyed by its path relative to the scanned
//! root. The store is the durable half of the incremental cache: a path with
//! a matching content hash is never summarized again.

mod connection;
mod files;
mod models;
mod schema;
mod store;

pub use connection::Database;
pub use files::{
    count_file_records, delete_file_record, get_file_record, get_fingerprint, list_fingerprints,
    upsert_file_record,
};
pub use models::{FileRecord, StoredFingerprint};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};
pub use store::RecordStore;
