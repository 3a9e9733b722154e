//! Collection repository.
//!
//! Wraps a [`BackendStore`] for one named collection. Records are addressed
//! by position. Every mutation re-reads the collection right before changing
//! it and writes the whole list back, so the window for lost updates is one
//! round trip; concurrent writers still race with last-write-wins.

use std::sync::Arc;

use tracing::{debug, info};

use crate::collection::CollectionSpec;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::store::{BackendStore, ReadOutcome};

/// Positional access to one collection.
#[derive(Debug, Clone)]
pub struct CollectionRepository {
    store: Arc<dyn BackendStore>,
    spec: CollectionSpec,
}

impl CollectionRepository {
    /// Create a repository for a collection.
    #[must_use]
    pub fn new(store: Arc<dyn BackendStore>, spec: CollectionSpec) -> Self {
        Self { store, spec }
    }

    /// The collection definition.
    #[must_use]
    pub fn spec(&self) -> &CollectionSpec {
        &self.spec
    }

    /// The collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Read the collection, keeping missing and unreadable apart.
    pub async fn read(&self) -> ReadOutcome {
        self.store.read(&self.spec.name).await
    }

    /// List all records. Missing or unreadable collections list as empty.
    pub async fn list(&self) -> Vec<Record> {
        self.read().await.into_records()
    }

    /// Append a record and return its position.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is invalid, the collection is
    /// unreadable, or the write fails.
    pub async fn append(&self, record: Record) -> Result<usize> {
        self.spec.validate_record(&record)?;
        let mut records = self.fetch_for_update().await?;
        records.push(record);
        self.save(&records).await?;

        let index = records.len() - 1;
        info!(collection = %self.spec.name, index, "Appended record");
        Ok(index)
    }

    /// Replace the record at `index`, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if no record is at `index` (for
    /// instance after another session deleted one), or any error from
    /// validation, reading or writing.
    pub async fn update_at(&self, index: usize, record: Record) -> Result<Record> {
        self.spec.validate_record(&record)?;
        self.modify_at(index, |current| {
            *current = record;
            Ok(())
        })
        .await
    }

    /// Remove the record at `index`; later records move up one position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordNotFound`] if no record is at `index`, or any
    /// error from reading or writing.
    pub async fn delete_at(&self, index: usize) -> Result<Record> {
        self.delete_at_if(index, |_| Ok(())).await
    }

    /// Apply `change` to the freshly read record at `index` and save.
    ///
    /// Returns the record as it was before the change. If `change` fails,
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Returns the error from `change`, [`Error::RecordNotFound`], or any
    /// error from reading or writing.
    pub async fn modify_at<F>(&self, index: usize, change: F) -> Result<Record>
    where
        F: FnOnce(&mut Record) -> Result<()>,
    {
        let mut records = self.fetch_for_update().await?;
        let len = records.len();
        let current = records.get_mut(index).ok_or_else(|| self.not_found(index, len))?;

        let before = current.clone();
        change(current)?;
        self.spec.validate_record(current)?;
        self.save(&records).await?;

        info!(collection = %self.spec.name, index, "Updated record");
        Ok(before)
    }

    /// Remove the record at `index` if `check` accepts the fresh copy of it.
    ///
    /// # Errors
    ///
    /// Returns the error from `check`, [`Error::RecordNotFound`], or any
    /// error from reading or writing.
    pub async fn delete_at_if<F>(&self, index: usize, check: F) -> Result<Record>
    where
        F: FnOnce(&Record) -> Result<()>,
    {
        let mut records = self.fetch_for_update().await?;
        let len = records.len();
        let target = records.get(index).ok_or_else(|| self.not_found(index, len))?;
        check(target)?;

        let removed = records.remove(index);
        self.save(&records).await?;

        info!(collection = %self.spec.name, index, "Deleted record");
        Ok(removed)
    }

    /// Re-read the collection before mutating it.
    ///
    /// An unreadable collection is never overwritten: doing so would replace
    /// data we could not see with a near-empty list.
    async fn fetch_for_update(&self) -> Result<Vec<Record>> {
        match self.read().await {
            ReadOutcome::Loaded(records) => Ok(records),
            ReadOutcome::Missing => Ok(Vec::new()),
            ReadOutcome::Unreadable { reason } => Err(Error::CollectionUnreadable {
                collection: self.spec.name.clone(),
                reason,
            }),
        }
    }

    async fn save(&self, records: &[Record]) -> Result<()> {
        debug!(
            collection = %self.spec.name,
            store = self.store.name(),
            "Saving {} records",
            records.len()
        );
        self.store.write(&self.spec.name, records).await
    }

    fn not_found(&self, index: usize, len: usize) -> Error {
        Error::RecordNotFound {
            collection: self.spec.name.clone(),
            index,
            len,
        }
    }
}
