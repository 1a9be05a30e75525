//! Record-store schema and its migrations.
//!
//! The `files` table layout is shared with other tools reading the same
//! store, so its column names are fixed.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

/// Ordered schema steps; entry `i` brings the store to version `i + 1`.
///
/// Every step uses `IF NOT EXISTS` so a `files` table created before
/// versioning is adopted rather than rejected.
const MIGRATIONS: &[(&str, &str)] = &[(
    "files table",
    "CREATE TABLE IF NOT EXISTS files (
        path TEXT PRIMARY KEY,
        tokensCount INTEGER,
        summary TEXT,
        summaryTokensCount INTEGER,
        hash TEXT,
        timestamp INTEGER,
        dependenciesLibs TEXT
    );",
)];

/// Schema version after all migrations.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/// Bring the store up to [`SCHEMA_VERSION`].
///
/// The applied version is kept in `PRAGMA user_version`, so calling this on
/// every startup is a no-op once current.
///
/// # Errors
///
/// Returns an error if a step fails or the store is newer than this build.
pub fn migrate(conn: &Connection) -> Result<()> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(StorageError::Migration(format!(
            "store schema v{current} is newer than supported v{SCHEMA_VERSION}"
        ))
        .into());
    }

    for (index, (name, sql)) in MIGRATIONS.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let version = index as i32 + 1;
        if version <= current {
            continue;
        }

        tracing::info!(version, step = name, "Applying store migration");
        conn.execute_batch(&format!(
            "BEGIN; {sql} PRAGMA user_version = {version}; COMMIT;"
        ))
        .map_err(|e| {
            let _ = conn.execute_batch("ROLLBACK");
            StorageError::Migration(format!("v{version} ({name}) failed: {e}"))
        })?;
    }

    Ok(())
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| StorageError::Migration(format!("cannot read schema version: {e}")).into())
}

/// Verify the `files` table exists with every expected column.
///
/// # Errors
///
/// Returns an error if the table or a column is missing.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let expected = [
        "path",
        "tokensCount",
        "summary",
        "summaryTokensCount",
        "hash",
        "timestamp",
        "dependenciesLibs",
    ];

    let mut stmt = conn
        .prepare("SELECT name FROM pragma_table_info('files')")
        .map_err(|e| StorageError::Migration(e.to_string()))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| StorageError::Migration(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Migration(e.to_string()))?;

    if columns.is_empty() {
        return Err(StorageError::Migration("table 'files' not found".to_string()).into());
    }

    for column in expected {
        if !columns.iter().any(|c| c == column) {
            return Err(StorageError::Migration(format!(
                "column 'files.{column}' not found"
            ))
            .into());
        }
    }

    tracing::debug!("Schema verification passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_migrate_empty_database() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            verify_schema(conn)
        })
        .unwrap();
    }

    #[test]
    fn test_migrate_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            migrate(conn)?;
            migrate(conn)?;
            verify_schema(conn)?;
            assert_eq!(user_version(conn)?, SCHEMA_VERSION);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_adopts_existing_files_table() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            // A store created by another tool before migrations were tracked.
            conn.execute_batch(
                "CREATE TABLE files (path TEXT PRIMARY KEY, tokensCount INTEGER, \
                 summary TEXT, summaryTokensCount INTEGER, hash TEXT, \
                 timestamp INTEGER, dependenciesLibs TEXT);
                 INSERT INTO files (path, hash) VALUES ('a.js', 'h');",
            )?;
            migrate(conn)?;
            verify_schema(conn)?;

            let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
            assert_eq!(count, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_rejects_newer_store() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .with_conn(|conn| {
                conn.execute_batch("PRAGMA user_version = 99")?;
                migrate(conn)
            })
            .unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn test_verify_schema_missing_table() {
        let db = Database::open_in_memory().unwrap();
        let err = db.with_conn(verify_schema).unwrap_err();
        assert!(err.to_string().contains("files"));
    }
}
