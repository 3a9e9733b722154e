//! `SQLite` schema definitions for the embedded store.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the collections table.
///
/// A row here means the collection has been written at least once, which is
/// what separates an empty collection from a missing one.
pub const CREATE_COLLECTIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the records table.
pub const CREATE_RECORDS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS records (
    collection TEXT NOT NULL,
    position INTEGER NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (collection, position)
)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_COLLECTIONS_TABLE,
    CREATE_RECORDS_TABLE,
    CREATE_METADATA_TABLE,
];
