//! Embedded `SQLite` store.
//!
//! Keeps every collection in one database file, one row per record with its
//! position. A write replaces all rows of a collection inside a single
//! transaction, so readers see either the old or the new list.
//!
//! `rusqlite` calls block, so they run on tokio's blocking pool and never
//! hold up the async workers.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{unreadable, BackendStore, ReadOutcome};
use crate::collection::validate_name;
use crate::error::{Error, Result};
use crate::record::Record;

const STORE_NAME: &str = "sqlite";

/// Storage engine backed by a single `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection, shared with blocking tasks.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a database at the given path.
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

        // WAL lets other sessions read while one writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| Error::internal("sqlite connection lock poisoned"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| Error::internal(format!("sqlite task failed: {e}")))?
    }

    fn load(conn: &Connection, collection: &str) -> Result<Option<Vec<Record>>> {
        let known: Option<String> = conn
            .query_row(
                "SELECT name FROM collections WHERE name = ?1",
                [collection],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Ok(None);
        }

        let mut stmt =
            conn.prepare("SELECT body FROM records WHERE collection = ?1 ORDER BY position")?;
        let bodies = stmt
            .query_map([collection], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let records = bodies
            .iter()
            .map(|body| serde_json::from_str(body))
            .collect::<std::result::Result<Vec<Record>, _>>()?;
        Ok(Some(records))
    }

    fn replace(conn: &mut Connection, collection: &str, records: &[Record]) -> Result<()> {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM records WHERE collection = ?1", [collection])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO records (collection, position, body) VALUES (?1, ?2, ?3)",
            )?;
            for (position, record) in records.iter().enumerate() {
                let position = i64::try_from(position)
                    .map_err(|_| Error::internal("collection too large"))?;
                insert.execute(params![collection, position, serde_json::to_string(record)?])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO collections (name, updated_at) VALUES (?1, ?2)",
            params![collection, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl BackendStore for SqliteStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    async fn read(&self, collection: &str) -> ReadOutcome {
        if let Err(e) = validate_name(collection) {
            return unreadable(STORE_NAME, collection, e);
        }
        let name = collection.to_string();
        match self.with_conn(move |conn| Self::load(conn, &name)).await {
            Ok(Some(records)) => {
                debug!("Read {} records for '{collection}'", records.len());
                ReadOutcome::Loaded(records)
            }
            Ok(None) => ReadOutcome::Missing,
            Err(e) => unreadable(STORE_NAME, collection, e),
        }
    }

    async fn write(&self, collection: &str, records: &[Record]) -> Result<()> {
        validate_name(collection)?;
        let name = collection.to_string();
        let rows = records.to_vec();
        self.with_conn(move |conn| Self::replace(conn, &name, &rows))
            .await
            .map_err(|e| Error::store_write(collection, e))?;
        debug!("Wrote {} records for '{collection}'", records.len());
        Ok(())
    }
}
