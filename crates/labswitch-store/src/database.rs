use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::info;

use crate::error::StoreError;
use crate::schema;

/// Thread-safe SQLite connection wrapper bound to one collection.
/// Uses parking_lot::Mutex for synchronous access (connections are not Sync).
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    collection: String,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &Path, collection: &str) -> Result<Self, StoreError> {
        check_collection(collection)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Io(format!("create dir: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Database(e.to_string()))?;
        init_schema(&conn, collection)?;

        info!(path = %path.display(), collection, "database opened");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_owned(),
            collection: collection.to_string(),
        })
    }

    /// Open an in-memory database.
    pub fn in_memory(collection: &str) -> Result<Self, StoreError> {
        check_collection(collection)?;

        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        init_schema(&conn, collection)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: PathBuf::from(":memory:"),
            collection: collection.to_string(),
        })
    }

    /// Execute a closure with the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Table holding the session records.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            path: self.path.clone(),
            collection: self.collection.clone(),
        }
    }
}

fn check_collection(collection: &str) -> Result<(), StoreError> {
    if schema::is_valid_collection(collection) {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(collection.to_string()))
    }
}

fn init_schema(conn: &Connection, collection: &str) -> Result<(), StoreError> {
    conn.execute_batch(schema::PRAGMAS)
        .map_err(|e| StoreError::Database(format!("pragmas: {e}")))?;

    conn.execute_batch(&schema::create_tables(collection))
        .map_err(|e| StoreError::Database(format!("schema: {e}")))?;

    let version: Option<u32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .ok();

    if version.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [schema::SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::Database(format!("schema version: {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_in_memory() {
        let db = Database::in_memory("registries").unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
        assert_eq!(db.collection(), "registries");
    }

    #[test]
    fn rejects_unsafe_collection() {
        let result = Database::in_memory("registries; DROP TABLE x");
        assert!(matches!(result, Err(StoreError::InvalidCollection(_))));
    }

    #[test]
    fn schema_version_set() {
        let db = Database::in_memory("registries").unwrap();
        let version: u32 = db
            .with_conn(|conn| {
                conn.query_row("SELECT version FROM schema_version", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn collection_table_created() {
        let db = Database::in_memory("lab_sessions").unwrap();
        db.with_conn(|conn| {
            let tables: Vec<String> = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?
                .query_map([], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            assert!(tables.contains(&"lab_sessions".to_string()));
            assert!(tables.contains(&"schema_version".to_string()));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn open_file_database_twice() {
        let dir = std::env::temp_dir().join(format!("labswitch-store-test-{}", uuid::Uuid::now_v7()));
        let path = dir.join("test.db");
        let db = Database::open(&path, "registries").unwrap();
        assert!(path.exists());

        // Reopening must not duplicate the schema version row.
        let db2 = Database::open(&path, "registries").unwrap();
        let rows: u32 = db2
            .with_conn(|conn| {
                conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(rows, 1);
        drop(db);
        drop(db2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
