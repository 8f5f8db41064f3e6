//! `SQLite` schema for dronegallery.
//!
//! Documents are stored as JSON field maps keyed by collection and id. The
//! schema version lives in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// The schema version this build reads and writes.
pub const CURRENT_VERSION: i32 = 1;

/// SQL statement to create the documents table.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    fields TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
)
";

/// SQL statement to create an index on collection for snapshot reads.
pub const CREATE_COLLECTION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_DOCUMENTS_TABLE, CREATE_COLLECTION_INDEX];

/// Create the schema on a fresh database, or check an existing one.
///
/// # Errors
///
/// Returns an error if the database was written by a newer schema version or
/// a statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(newer_version(version));
    }

    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    if version < CURRENT_VERSION {
        conn.pragma_update(None, "user_version", CURRENT_VERSION)?;
    }
    Ok(())
}

/// Check that a database can be read without touching it.
///
/// # Errors
///
/// Returns an error if the database was never initialized, was written by a
/// newer schema version, or is not a database at all.
pub fn check_schema(conn: &Connection) -> Result<()> {
    match schema_version(conn)? {
        0 => Err(Error::DatabaseMigration {
            message: "database has no gallery schema".to_string(),
        }),
        version if version > CURRENT_VERSION => Err(newer_version(version)),
        _ => Ok(()),
    }
}

fn newer_version(version: i32) -> Error {
    Error::DatabaseMigration {
        message: format!(
            "database schema version {version} is newer than supported version {CURRENT_VERSION}"
        ),
    }
}

/// Read the schema version recorded in the database (0 when fresh).
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    #[test]
    fn test_create_documents_table_contains_required_columns() {
        assert!(CREATE_DOCUMENTS_TABLE.contains("collection TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("id TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("fields TEXT NOT NULL"));
        assert!(CREATE_DOCUMENTS_TABLE.contains("PRIMARY KEY (collection, id)"));
    }

    #[test]
    fn test_initialize_schema_creates_table_and_version() {
        let conn = create_test_db();
        assert_eq!(schema_version(&conn).unwrap(), 0);

        initialize_schema(&conn).expect("failed to initialize schema");

        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='documents'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("first init failed");
        initialize_schema(&conn).expect("second init failed");
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_rejects_newer_version() {
        let conn = create_test_db();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1)
            .unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_collection_index_created() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='documents'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();

        assert!(indexes.iter().any(|n| n.contains("collection")));
    }

    #[test]
    fn test_check_schema_accepts_initialized_database() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        assert!(check_schema(&conn).is_ok());
    }

    #[test]
    fn test_check_schema_rejects_fresh_database() {
        let conn = create_test_db();
        let err = check_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("no gallery schema"));
        // Nothing was created
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_check_schema_rejects_newer_version() {
        let conn = create_test_db();
        conn.pragma_update(None, "user_version", CURRENT_VERSION + 1)
            .unwrap();
        let err = check_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }
}
