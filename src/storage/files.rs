//! Per-path file records.

use rusqlite::{Connection, OptionalExtension, Row};

use super::models::{FileRecord, StoredFingerprint};
use crate::error::StorageError;
use crate::Result;

/// Insert or replace the record for `record.path`.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_file_record(conn: &Connection, record: &FileRecord) -> Result<()> {
    let deps = serde_json::to_string(&record.dependency_libraries).map_err(|e| {
        StorageError::Corrupt {
            path: record.path.clone(),
            reason: format!("cannot encode dependencies: {e}"),
        }
    })?;

    conn.execute(
        "INSERT OR REPLACE INTO files \
         (path, tokensCount, summary, summaryTokensCount, hash, timestamp, dependenciesLibs) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            record.path,
            record.content_tokens,
            record.summary,
            record.summary_tokens,
            record.content_hash,
            record.last_modified,
            deps,
        ],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(())
}

/// Get the full record for a path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_file_record(conn: &Connection, path: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        "SELECT path, tokensCount, summary, summaryTokensCount, hash, timestamp, dependenciesLibs \
         FROM files WHERE path = ?",
        [path],
        row_to_record,
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// Get only the stored fingerprint for a path.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_fingerprint(conn: &Connection, path: &str) -> Result<Option<StoredFingerprint>> {
    conn.query_row(
        "SELECT path, hash, timestamp FROM files WHERE path = ?",
        [path],
        row_to_fingerprint,
    )
    .optional()
    .map_err(|e| StorageError::Database(e.to_string()).into())
}

/// List every stored `{path, hash, timestamp}` triple.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_fingerprints(conn: &Connection) -> Result<Vec<StoredFingerprint>> {
    let mut stmt = conn
        .prepare("SELECT path, hash, timestamp FROM files ORDER BY path")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let rows = stmt
        .query_map([], row_to_fingerprint)
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(rows)
}

/// Delete the record for a path. Returns whether a row was removed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_file_record(conn: &Connection, path: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM files WHERE path = ?", [path])
        .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(removed > 0)
}

/// Count tracked files.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_file_records(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}

// Columns other than `path` are nullable in stores written by older tools; a
// missing hash never matches a live hash, so such rows re-summarize.
fn row_to_fingerprint(row: &Row<'_>) -> rusqlite::Result<StoredFingerprint> {
    Ok(StoredFingerprint {
        path: row.get(0)?,
        hash: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        timestamp: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
    })
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let deps: Option<String> = row.get(6)?;
    Ok(FileRecord {
        path: row.get(0)?,
        content_tokens: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
        summary: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        summary_tokens: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
        content_hash: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        last_modified: row.get::<_, Option<i64>>(5)?.unwrap_or_default(),
        dependency_libraries: decode_dependencies(deps.as_deref()),
    })
}

/// Decode `dependenciesLibs`: a JSON array, or a comma-separated list.
fn decode_dependencies(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Vec::new();
    };

    serde_json::from_str::<Vec<String>>(raw).unwrap_or_else(|_| {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{migrate, Database};

    fn setup_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(migrate).unwrap();
        db
    }

    fn record(path: &str, hash: &str) -> FileRecord {
        FileRecord::new(path, hash, 1_000, 66, format!("summary of {path}"), 4)
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();

        db.with_conn(|conn| {
            let rec = record("src/a.js", "h1").with_dependencies(vec!["yargs".to_string()]);
            upsert_file_record(conn, &rec)?;

            let retrieved = get_file_record(conn, "src/a.js")?.unwrap();
            assert_eq!(retrieved, rec);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_upsert_replaces_whole_record() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_file_record(
                conn,
                &record("a.js", "h1").with_dependencies(vec!["chalk".to_string()]),
            )?;
            let replacement = FileRecord::new("a.js", "h2", 2_000, 10, "new summary", 2);
            upsert_file_record(conn, &replacement)?;

            assert_eq!(count_file_records(conn)?, 1);
            let stored = get_file_record(conn, "a.js")?.unwrap();
            assert_eq!(stored, replacement);
            assert!(stored.dependency_libraries.is_empty());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_get_nonexistent() {
        let db = setup_db();
        let result = db
            .with_conn(|conn| get_file_record(conn, "missing.js"))
            .unwrap();
        assert!(result.is_none());
        let fp = db.with_conn(|conn| get_fingerprint(conn, "missing.js")).unwrap();
        assert!(fp.is_none());
    }

    #[test]
    fn test_delete_reports_presence() {
        let db = setup_db();

        db.with_conn(|conn| {
            upsert_file_record(conn, &record("a.js", "h"))?;
            assert!(delete_file_record(conn, "a.js")?);
            assert!(!delete_file_record(conn, "a.js")?);
            assert!(get_file_record(conn, "a.js")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_list_fingerprints() {
        let db = setup_db();

        let fps = db
            .with_conn(|conn| {
                upsert_file_record(conn, &record("b.js", "hb"))?;
                upsert_file_record(conn, &record("a.js", "ha"))?;
                list_fingerprints(conn)
            })
            .unwrap();

        assert_eq!(fps.len(), 2);
        assert_eq!(fps[0].path, "a.js");
        assert_eq!(fps[0].hash, "ha");
        assert_eq!(fps[1].timestamp, 1_000);
    }

    #[test]
    fn test_nullable_legacy_columns() {
        let db = setup_db();

        db.with_conn(|conn| {
            conn.execute("INSERT INTO files (path) VALUES ('legacy.js')", [])?;
            let fp = get_fingerprint(conn, "legacy.js")?.unwrap();
            assert_eq!(fp.hash, "");
            let rec = get_file_record(conn, "legacy.js")?.unwrap();
            assert_eq!(rec.summary, "");
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_decode_dependencies() {
        assert!(decode_dependencies(None).is_empty());
        assert!(decode_dependencies(Some("  ")).is_empty());
        assert_eq!(
            decode_dependencies(Some(r#"["chalk","yargs"]"#)),
            vec!["chalk".to_string(), "yargs".to_string()]
        );
        assert_eq!(
            decode_dependencies(Some("fs, path ,")),
            vec!["fs".to_string(), "path".to_string()]
        );
    }
}
