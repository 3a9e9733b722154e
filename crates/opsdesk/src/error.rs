//! Error types for opsdesk.
//!
//! This module defines all error types used throughout the opsdesk crate.
//! Store read failures are deliberately absent: reads fail open and report
//! through [`crate::store::ReadOutcome`] instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::policy::Capability;

/// The main error type for opsdesk operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Access Errors ===
    /// The supplied credentials did not match any configured identity.
    #[error("access denied: invalid credentials for '{username}'")]
    AuthFailure {
        /// The username that attempted to log in.
        username: String,
    },

    /// The session has no authenticated identity.
    #[error("not logged in")]
    NotAuthenticated,

    /// The resolved role does not grant the capability on the collection.
    #[error("{role} may not {capability} records in '{collection}'")]
    CapabilityDenied {
        /// Display name of the role that was checked.
        role: String,
        /// The capability that was required.
        capability: Capability,
        /// Name of the collection.
        collection: String,
    },

    /// Only the assignee of a work assignment may perform the action.
    #[error("only {owner} may {action} assignment #{index}")]
    NotOwner {
        /// Username the assignment belongs to.
        owner: String,
        /// What was attempted (e.g. "toggle", "delete").
        action: &'static str,
        /// Position of the assignment.
        index: usize,
    },

    // === Collection Errors ===
    /// The collection is not configured.
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    /// The collection name cannot be used as a storage key.
    #[error("invalid collection name '{0}'")]
    InvalidCollectionName(String),

    /// A record failed validation against its collection.
    #[error("invalid record for '{collection}': {message}")]
    InvalidRecord {
        /// Name of the collection.
        collection: String,
        /// Description of the validation failure.
        message: String,
    },

    /// No record exists at the given position.
    #[error("no record at position {index} in '{collection}' ({len} records)")]
    RecordNotFound {
        /// Name of the collection.
        collection: String,
        /// The requested position.
        index: usize,
        /// Number of records at the time of the request.
        len: usize,
    },

    // === Store Errors ===
    /// A collection could not be read, so it will not be overwritten.
    #[error("'{collection}' could not be read ({reason}); refusing to overwrite it")]
    CollectionUnreadable {
        /// Name of the collection.
        collection: String,
        /// Why the read failed.
        reason: String,
    },

    /// Persisting a collection failed; the mutation was not committed.
    #[error("failed to save '{collection}': {message}")]
    StoreWrite {
        /// Name of the collection.
        collection: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// HTTP communication with the remote store failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A password could not be hashed or a stored hash could not be parsed.
    #[error("password hash error: {0}")]
    PasswordHash(String),

    // === I/O Errors ===
    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for opsdesk operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create an authentication failure for the given username.
    #[must_use]
    pub fn auth_failure(username: impl Into<String>) -> Self {
        Self::AuthFailure {
            username: username.into(),
        }
    }

    /// Create a store write error.
    #[must_use]
    pub fn store_write(collection: impl Into<String>, message: impl ToString) -> Self {
        Self::StoreWrite {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Create an invalid record error.
    #[must_use]
    pub fn invalid_record(collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a configuration validation error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a rejected login.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthFailure { .. })
    }

    /// Check if this error means the caller lacked the right to act.
    ///
    /// Such errors are always raised before the store is written.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(
            self,
            Self::CapabilityDenied { .. } | Self::NotOwner { .. } | Self::NotAuthenticated
        )
    }
}
