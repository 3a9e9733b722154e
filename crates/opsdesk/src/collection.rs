//! Collection definitions.
//!
//! Each dashboard tab maps to one named collection. The set of collections,
//! their recognized fields and their access kind come from configuration.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::Record;

/// Name reserved for the last-access singleton.
pub const LAST_ACCESS: &str = "last_access";

/// Pattern every collection name must match.
const NAME_PATTERN: &str = r"^[a-z][a-z0-9_-]{0,63}$";

fn name_regex() -> &'static Regex {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("collection name pattern is valid"))
}

/// Validate a collection name before it is used as a file name or URL segment.
///
/// # Errors
///
/// Returns [`Error::InvalidCollectionName`] if the name is not lowercase
/// alphanumeric (with `_` or `-`) starting with a letter.
pub fn validate_name(name: &str) -> Result<()> {
    if name_regex().is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidCollectionName(name.to_string()))
    }
}

/// How access to a collection is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Editors manage records; everyone else reads.
    #[default]
    Standard,
    /// Only the restricted publisher posts; everyone else reads.
    PublisherOnly,
    /// Work distribution with per-record owners.
    WorkAssignment,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::PublisherOnly => write!(f, "publisher_only"),
            Self::WorkAssignment => write!(f, "work_assignment"),
        }
    }
}

/// Definition of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Storage name of the collection.
    pub name: String,
    /// Human-readable tab title.
    #[serde(default)]
    pub title: String,
    /// Recognized fields, in display order.
    pub fields: Vec<String>,
    /// Access kind.
    #[serde(default)]
    pub kind: CollectionKind,
}

impl CollectionSpec {
    /// Create a collection definition.
    #[must_use]
    pub fn new(name: &str, title: &str, fields: &[&str], kind: CollectionKind) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            fields: fields.iter().map(ToString::to_string).collect(),
            kind,
        }
    }

    /// Check that a record only uses recognized fields.
    ///
    /// Missing fields are allowed; the dashboard renders them as blank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRecord`] for empty records or unknown fields.
    pub fn validate_record(&self, record: &Record) -> Result<()> {
        if record.is_empty() {
            return Err(Error::invalid_record(&self.name, "record has no fields"));
        }
        if let Some(unknown) = record
            .fields()
            .find(|field| !self.fields.iter().any(|known| known == field))
        {
            return Err(Error::invalid_record(
                &self.name,
                format!(
                    "unknown field '{unknown}' (expected one of: {})",
                    self.fields.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

/// The dashboard's standard tabs.
#[must_use]
pub fn default_collections() -> Vec<CollectionSpec> {
    use CollectionKind::{PublisherOnly, Standard, WorkAssignment};

    vec![
        CollectionSpec::new("ongoing", "Ongoing Tasks", &["title", "due", "status"], Standard),
        CollectionSpec::new(
            "institutions",
            "Institutions",
            &["name", "type", "state", "officer", "contact", "notes"],
            Standard,
        ),
        CollectionSpec::new(
            "edtech",
            "EdTech Partners",
            &["name", "contact", "website", "state"],
            Standard,
        ),
        CollectionSpec::new(
            "interns",
            "Interns",
            &["name", "college", "reason", "task", "resume_uploaded"],
            Standard,
        ),
        CollectionSpec::new("bugs", "Bugs", &["issue", "priority", "screenshot"], Standard),
        CollectionSpec::new("ideas", "Ideas", &["idea"], Standard),
        CollectionSpec::new(
            "campaigns",
            "Campaigns",
            &["platform", "title", "duration", "start_date", "notes"],
            Standard,
        ),
        CollectionSpec::new("messages", "Messages", &["message"], PublisherOnly),
        CollectionSpec::new(
            "assignments",
            "Work Distribution",
            &["task", "assigned_to", "priority", "done"],
            WorkAssignment,
        ),
    ]
}
