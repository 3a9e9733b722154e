//! File-backed store: one JSON document per collection.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::{unreadable, BackendStore, ReadOutcome};
use crate::collection::validate_name;
use crate::error::{Error, Result};
use crate::record::Record;

const STORE_NAME: &str = "file";

/// Stores each collection as `<dir>/<collection>.json`.
///
/// The file holds a pretty-printed JSON array with 4-space indentation, one
/// element per record, field order preserved. Writes land in a temporary
/// sibling first and are renamed over the target.
#[derive(Debug)]
pub struct FileStore {
    /// Directory holding the collection files.
    dir: PathBuf,
    /// Distinguishes temporary files of overlapping writes.
    write_seq: AtomicU64,
}

impl FileStore {
    /// Open a file store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }
        debug!("File store at {}", dir.display());
        Ok(Self {
            dir,
            write_seq: AtomicU64::new(0),
        })
    }

    /// Get the directory holding the collection files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing a collection.
    #[must_use]
    pub fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.json"))
    }

    fn temp_path_for(&self, collection: &str) -> PathBuf {
        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{collection}.json.{}.{seq}.tmp",
            std::process::id()
        ))
    }
}

/// Serialize records the way the dashboard has always written them.
fn to_pretty_json(records: &[Record]) -> serde_json::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut serializer)?;
    Ok(buf)
}

#[async_trait]
impl BackendStore for FileStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    async fn read(&self, collection: &str) -> ReadOutcome {
        if let Err(e) = validate_name(collection) {
            return unreadable(STORE_NAME, collection, e);
        }
        let path = self.path_for(collection);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No file for '{}' at {}", collection, path.display());
                return ReadOutcome::Missing;
            }
            Err(e) => return unreadable(STORE_NAME, collection, e),
        };

        match serde_json::from_slice::<Vec<Record>>(&bytes) {
            Ok(records) => {
                debug!("Read {} records from {}", records.len(), path.display());
                ReadOutcome::Loaded(records)
            }
            Err(e) => unreadable(STORE_NAME, collection, e),
        }
    }

    async fn write(&self, collection: &str, records: &[Record]) -> Result<()> {
        validate_name(collection)?;
        let path = self.path_for(collection);
        let temp = self.temp_path_for(collection);

        let bytes = to_pretty_json(records).map_err(|e| Error::store_write(collection, e))?;

        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            return Err(Error::store_write(collection, e));
        }
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::store_write(collection, e));
        }

        debug!("Wrote {} records to {}", records.len(), path.display());
        Ok(())
    }
}
