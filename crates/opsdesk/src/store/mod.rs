//! Backend stores for opsdesk.
//!
//! A backend store persists a named collection as one ordered list of
//! records. Reads fail open: a collection that is missing or cannot be read
//! comes back as an explicit [`ReadOutcome`] which callers flatten to an empty
//! list. Writes replace the whole collection and report every failure.

mod file;
mod memory;
mod remote;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::Result;
use crate::record::Record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

/// Result of reading a collection.
///
/// Missing and unreadable collections both look empty to the dashboard, but
/// are kept apart here so that callers and tests can tell them apart.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// The collection was read; it may legitimately be empty.
    Loaded(Vec<Record>),
    /// The collection has never been written.
    Missing,
    /// The collection exists but could not be read or parsed.
    Unreadable {
        /// Description of the failure.
        reason: String,
    },
}

impl ReadOutcome {
    /// Flatten to a record list, treating missing and unreadable as empty.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Loaded(records) => records,
            Self::Missing | Self::Unreadable { .. } => Vec::new(),
        }
    }

    /// Check if the read failed (as opposed to finding nothing).
    #[must_use]
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable { .. })
    }
}

/// Build an unreadable outcome and log it.
pub(crate) fn unreadable(store: &str, collection: &str, reason: impl ToString) -> ReadOutcome {
    let reason = reason.to_string();
    warn!(
        store,
        collection, "Collection unreadable, treating as empty: {reason}"
    );
    ReadOutcome::Unreadable { reason }
}

/// Persistence medium for collections.
///
/// Implementations must make `write` atomic from a reader's point of view: a
/// concurrent `read` sees either the old or the new list, never a mix.
#[async_trait]
pub trait BackendStore: Send + Sync + fmt::Debug {
    /// The name of this store (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Read the full collection. Never fails; see [`ReadOutcome`].
    async fn read(&self, collection: &str) -> ReadOutcome;

    /// Replace the full collection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreWrite`] if the collection could not be
    /// persisted. The previous contents remain in place.
    async fn write(&self, collection: &str, records: &[Record]) -> Result<()>;
}

/// Open the store selected by configuration.
///
/// # Errors
///
/// Returns an error if the data directory, database or HTTP client cannot be
/// set up.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn BackendStore>> {
    let store: Arc<dyn BackendStore> = match config.backend {
        StoreBackend::File => Arc::new(FileStore::open(config.data_dir())?),
        StoreBackend::Remote => Arc::new(RemoteStore::new(&config.remote)?),
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(config.database_path())?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
