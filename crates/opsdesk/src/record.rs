//! Core record types for opsdesk.
//!
//! A [`Record`] is an ordered mapping from field name to [`FieldValue`]. The
//! store never enforces a schema; the recognized fields of each collection are
//! checked by [`crate::collection::CollectionSpec`].

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single field value.
///
/// Values are serialized without a tag, so a stored record reads as plain JSON
/// (`{"title": "Call vendor", "done": false}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// An absent value.
    Null,
    /// A boolean flag.
    Bool(bool),
    /// A whole number.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// Free text.
    Text(String),
    /// A list of strings.
    List(Vec<String>),
}

impl FieldValue {
    /// Borrow the text if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the flag if this is a boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the number if this is an integer value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Short name of the value's kind, used in validation messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// One entry in a collection.
///
/// Records carry no identifier of their own; their identity is their position
/// in the collection for the duration of one read-mutate-write cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(IndexMap<String, FieldValue>);

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, keeping insertion order.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    /// Set a field, returning the previous value.
    ///
    /// Replacing an existing field keeps its original position.
    pub fn insert(
        &mut self,
        field: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Option<FieldValue> {
        self.0.insert(field.into(), value.into())
    }

    /// Get a field value.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    /// Get a text field.
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_str)
    }

    /// Field names in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterate over `(field, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display label for the record: its first field, or `Row N` (1-based).
    #[must_use]
    pub fn label(&self, index: usize) -> String {
        match self.0.first() {
            Some((_, value)) if !value.to_string().is_empty() => value.to_string(),
            _ => format!("Row {}", index + 1),
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_preserves_field_order() {
        let record = Record::new()
            .with("title", "Fix login")
            .with("due", "Friday")
            .with("status", "open");

        let fields: Vec<&str> = record.fields().collect();
        assert_eq!(fields, vec!["title", "due", "status"]);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"title":"Fix login","due":"Friday","status":"open"}"#
        );
    }

    #[test]
    fn test_record_deserialize_keeps_order() {
        let json = r#"{"zeta": 1, "alpha": true, "mid": "x"}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        let fields: Vec<&str> = record.fields().collect();
        assert_eq!(fields, vec!["zeta", "alpha", "mid"]);
        assert_eq!(record.get("zeta"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("alpha"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_field_value_untagged_forms() {
        let json = r#"{"a": null, "b": 2.5, "c": ["x", "y"], "d": "text"}"#;
        let record: Record = serde_json::from_str(json).unwrap();

        assert_eq!(record.get("a"), Some(&FieldValue::Null));
        assert_eq!(record.get("b"), Some(&FieldValue::Float(2.5)));
        assert_eq!(
            record.get("c"),
            Some(&FieldValue::List(vec!["x".to_string(), "y".to_string()]))
        );
        assert_eq!(record.get_str("d"), Some("text"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut record = Record::new().with("a", 1_i64).with("b", 2_i64);
        let previous = record.insert("a", 10_i64);

        assert_eq!(previous, Some(FieldValue::Integer(1)));
        assert_eq!(record.fields().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.get("a").and_then(FieldValue::as_i64), Some(10));
    }

    #[test]
    fn test_unsuffixed_integer_literal() {
        let record = Record::new().with("priority", 1).with("count", -7);
        assert_eq!(record.get("priority"), Some(&FieldValue::Integer(1)));
        assert_eq!(record.get("count").and_then(FieldValue::as_i64), Some(-7));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Null.to_string(), "");
        assert_eq!(FieldValue::from(true).to_string(), "true");
        assert_eq!(FieldValue::from("hi").to_string(), "hi");
        assert_eq!(
            FieldValue::from(vec!["a".to_string(), "b".to_string()]).to_string(),
            "a, b"
        );
    }

    #[test]
    fn test_label() {
        let record = Record::new().with("name", "IIT Madras");
        assert_eq!(record.label(0), "IIT Madras");

        let blank = Record::new().with("name", "");
        assert_eq!(blank.label(4), "Row 5");
        assert_eq!(Record::new().label(0), "Row 1");
    }

    #[test]
    fn test_from_iterator() {
        let record: Record = vec![("idea", "Weekly demo")].into_iter().collect();
        assert_eq!(record.len(), 1);
        assert!(!record.is_empty());
        assert_eq!(record.get_str("idea"), Some("Weekly demo"));
    }
}
