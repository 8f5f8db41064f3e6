//! Storage layer for dronegallery.
//!
//! This module provides a `SQLite`-backed document store holding image-set
//! documents, and [`SqliteCollection`], which turns a store written by an
//! external producer into a live [`DocumentCollection`](crate::DocumentCollection).

pub mod schema;
mod watch;

pub use watch::SqliteCollection;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::collection::{CollectionQuery, Snapshot};
use crate::error::{Error, Result};
use crate::record::Document;

/// `SQLite` document store.
///
/// The gallery only reads from it. [`DocumentStore::put`] exists for the
/// producer side and for tests.
#[derive(Debug)]
pub struct DocumentStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl DocumentStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets the producer write while viewers read
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        schema::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Open an existing store without writing to it.
    ///
    /// Nothing is created: the file must exist and carry the gallery schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, is not a database, or has no
    /// readable schema.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        debug!("Opening database read-only at {}", path.display());
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        schema::check_schema(&conn)?;

        info!("Database opened read-only at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        schema::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields cannot be encoded or the write fails.
    pub fn put(&self, collection: &str, document: &Document) -> Result<()> {
        let fields = serde_json::to_string(&document.fields)?;
        self.conn.execute(
            r"
            INSERT INTO documents (collection, id, fields)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(collection, id) DO UPDATE
                SET fields = excluded.fields, updated_at = datetime('now')
            ",
            params![collection, document.id, fields],
        )?;
        debug!("Stored document {}/{}", collection, document.id);
        Ok(())
    }

    /// Get a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let result = self
            .conn
            .query_row(
                "SELECT id, fields FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                Self::row_to_document,
            )
            .optional()?;
        Ok(result)
    }

    /// List every document of a collection, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, collection: &str) -> Result<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id, fields FROM documents WHERE collection = ?1 ORDER BY id")?;

        let documents = stmt
            .query_map([collection], Self::row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(documents)
    }

    /// Read the current result set of a query.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn snapshot(&self, query: &CollectionQuery) -> Result<Snapshot> {
        let documents = self.list(&query.collection)?;
        Ok(Snapshot::new(query.arrange(documents)))
    }

    /// Count the documents of a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self, collection: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// `PRAGMA data_version`: changes whenever another connection commits.
    ///
    /// # Errors
    ///
    /// Returns an error if the pragma cannot be read.
    pub fn data_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .pragma_query_value(None, "data_version", |row| row.get(0))?)
    }

    /// Get statistics for one collection.
    ///
    /// `order_by` names the timestamp field used for oldest/newest.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self, collection: &str, order_by: &str) -> Result<StoreStats> {
        let documents = self.list(collection)?;
        let times: Vec<DateTime<Utc>> = documents
            .iter()
            .filter_map(|doc| doc.timestamp_field(order_by))
            .filter_map(|ts| ts.to_utc())
            .collect();

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StoreStats {
            total_documents: documents.len(),
            timestamped_documents: times.len(),
            oldest_capture: times.iter().min().copied(),
            newest_capture: times.iter().max().copied(),
            db_size_bytes,
        })
    }

    /// Convert a database row to a Document.
    fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
        let id: String = row.get(0)?;
        let raw: String = row.get(1)?;

        let fields = match serde_json::from_str::<Map<String, Value>>(&raw) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Document {} has unreadable fields ({}), treating as empty", id, e);
                Map::new()
            }
        };

        Ok(Document { id, fields })
    }
}

/// Statistics about one stored collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of documents in the collection.
    pub total_documents: usize,
    /// Number of documents with a readable capture timestamp.
    pub timestamped_documents: usize,
    /// Earliest capture time.
    pub oldest_capture: Option<DateTime<Utc>>,
    /// Latest capture time.
    pub newest_capture: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Timestamp, TIMESTAMP_FIELD};

    const IMAGES: &str = "images";

    fn create_test_store() -> DocumentStore {
        DocumentStore::open_in_memory().expect("failed to create test store")
    }

    fn create_test_document(id: &str, seconds: i64) -> Document {
        Document::composite(
            id,
            "https://img/thermal.jpg",
            "https://img/depth.jpg",
            "https://img/rgb.jpg",
            "https://img/fuse.jpg",
            Some(Timestamp::new(seconds, 0)),
        )
    }

    #[test]
    fn test_open_in_memory() {
        assert!(DocumentStore::open_in_memory().is_ok());
    }

    #[test]
    fn test_put_and_get() {
        let store = create_test_store();
        let doc = create_test_document("10:00:00", 100);

        store.put(IMAGES, &doc).unwrap();

        let retrieved = store.get(IMAGES, "10:00:00").unwrap().unwrap();
        assert_eq!(retrieved, doc);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get(IMAGES, "missing").unwrap().is_none());
    }

    #[test]
    fn test_put_replaces_same_id() {
        let store = create_test_store();
        store.put(IMAGES, &create_test_document("a", 1)).unwrap();
        store.put(IMAGES, &create_test_document("a", 2)).unwrap();

        assert_eq!(store.count(IMAGES).unwrap(), 1);
        let doc = store.get(IMAGES, "a").unwrap().unwrap();
        assert_eq!(doc.timestamp_field(TIMESTAMP_FIELD), Some(Timestamp::new(2, 0)));
    }

    #[test]
    fn test_collections_are_separate() {
        let store = create_test_store();
        store.put(IMAGES, &create_test_document("a", 1)).unwrap();
        store.put("other", &create_test_document("b", 1)).unwrap();

        assert_eq!(store.count(IMAGES).unwrap(), 1);
        assert_eq!(store.list("other").unwrap()[0].id, "b");
    }

    #[test]
    fn test_snapshot_is_ordered_newest_first() {
        let store = create_test_store();
        store.put(IMAGES, &create_test_document("a", 10)).unwrap();
        store.put(IMAGES, &create_test_document("c", 30)).unwrap();
        store.put(IMAGES, &create_test_document("b", 20)).unwrap();

        let snapshot = store.snapshot(&CollectionQuery::new(IMAGES)).unwrap();
        let ids: Vec<_> = snapshot.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_unreadable_fields_are_treated_as_empty() {
        let store = create_test_store();
        store
            .conn
            .execute(
                "INSERT INTO documents (collection, id, fields) VALUES (?1, 'bad', 'not json')",
                [IMAGES],
            )
            .unwrap();

        let doc = store.get(IMAGES, "bad").unwrap().unwrap();
        assert!(doc.fields.is_empty());
        // No order field, so queries leave it out
        assert!(store
            .snapshot(&CollectionQuery::new(IMAGES))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_stats_empty() {
        let store = create_test_store();
        let stats = store.stats(IMAGES, TIMESTAMP_FIELD).unwrap();
        assert_eq!(stats.total_documents, 0);
        assert!(stats.oldest_capture.is_none());
        assert!(stats.newest_capture.is_none());
        assert_eq!(stats.db_size_bytes, 0);
    }

    #[test]
    fn test_stats_with_data() {
        let store = create_test_store();
        store.put(IMAGES, &create_test_document("a", 100)).unwrap();
        store.put(IMAGES, &create_test_document("b", 200)).unwrap();
        store
            .put(IMAGES, &Document::single("c", "u", None))
            .unwrap();

        let stats = store.stats(IMAGES, TIMESTAMP_FIELD).unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.timestamped_documents, 2);
        assert_eq!(stats.oldest_capture.unwrap().timestamp(), 100);
        assert_eq!(stats.newest_capture.unwrap().timestamp(), 200);
    }

    #[test]
    fn test_data_version_changes_on_foreign_commit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.db");

        let reader = DocumentStore::open(&path).unwrap();
        let writer = DocumentStore::open(&path).unwrap();

        let before = reader.data_version().unwrap();
        writer.put(IMAGES, &create_test_document("a", 1)).unwrap();
        let after = reader.data_version().unwrap();

        assert_ne!(before, after);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested/deeper/gallery.db");

        let store = DocumentStore::open(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(store.path(), nested);
    }

    #[test]
    fn test_open_read_only_sees_producer_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.db");

        let writer = DocumentStore::open(&path).unwrap();
        writer.put(IMAGES, &create_test_document("a", 1)).unwrap();

        let reader = DocumentStore::open_read_only(&path).unwrap();
        assert_eq!(reader.count(IMAGES).unwrap(), 1);

        let before = reader.data_version().unwrap();
        writer.put(IMAGES, &create_test_document("b", 2)).unwrap();
        assert_ne!(reader.data_version().unwrap(), before);
        assert_eq!(reader.count(IMAGES).unwrap(), 2);
    }

    #[test]
    fn test_open_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.db");
        DocumentStore::open(&path).unwrap();

        let reader = DocumentStore::open_read_only(&path).unwrap();
        assert!(reader.put(IMAGES, &create_test_document("a", 1)).is_err());
    }

    #[test]
    fn test_open_read_only_does_not_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/gallery.db");

        let err = DocumentStore::open_read_only(&path).unwrap_err();
        assert!(matches!(err, Error::DatabaseOpen { .. }));
        assert!(!path.exists());
        assert!(!dir.path().join("missing").exists());
    }

    #[test]
    fn test_open_read_only_rejects_non_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.db");
        std::fs::write(&path, vec![0x42_u8; 8192]).unwrap();

        assert!(DocumentStore::open_read_only(&path).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), vec![0x42_u8; 8192]);
    }

    #[test]
    fn test_open_read_only_rejects_uninitialized_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE other (x INTEGER)")
            .unwrap();

        let err = DocumentStore::open_read_only(&path).unwrap_err();
        assert!(matches!(err, Error::DatabaseMigration { .. }));
    }
}
