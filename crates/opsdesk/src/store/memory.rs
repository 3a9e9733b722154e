//! In-process store, used for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BackendStore, ReadOutcome};
use crate::collection::validate_name;
use crate::error::{Error, Result};
use crate::record::Record;

/// Keeps collections in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Record>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BackendStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn read(&self, collection: &str) -> ReadOutcome {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .map_or(ReadOutcome::Missing, ReadOutcome::Loaded)
    }

    async fn write(&self, collection: &str, records: &[Record]) -> Result<()> {
        validate_name(collection)?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::store_write(collection, "writes disabled"));
        }
        self.collections
            .write()
            .await
            .insert(collection.to_string(), records.to_vec());
        Ok(())
    }
}
