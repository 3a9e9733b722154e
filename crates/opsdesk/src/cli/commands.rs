//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands and the parser
//! for `key=value` record fields.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::record::{FieldValue, Record};

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Collection to list
    pub collection: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Add command arguments.
#[derive(Debug, Args)]
pub struct AddCommand {
    /// Collection to append to
    pub collection: String,

    /// Fields as key=value (e.g. `title="Visit" due=2024-06-01 done=false`)
    #[arg(required = true, value_parser = parse_field)]
    pub fields: Vec<(String, FieldValue)>,
}

/// Update command arguments.
#[derive(Debug, Args)]
pub struct UpdateCommand {
    /// Collection containing the record
    pub collection: String,

    /// Position of the record (as shown by `list`)
    pub index: usize,

    /// Replacement fields as key=value
    #[arg(required = true, value_parser = parse_field)]
    pub fields: Vec<(String, FieldValue)>,
}

/// Delete command arguments.
#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Collection containing the record
    pub collection: String,

    /// Position of the record (as shown by `list`)
    pub index: usize,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per record
    Plain,
    /// Aligned columns
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Build a record from parsed `key=value` pairs, keeping their order.
#[must_use]
pub fn record_from_fields(fields: Vec<(String, FieldValue)>) -> Record {
    fields.into_iter().collect()
}

/// Parse one `key=value` argument.
///
/// # Errors
///
/// Returns a message for clap if there is no `=` or the key is empty.
pub fn parse_field(arg: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in '{arg}'"));
    }
    Ok((key.to_string(), parse_value(value)))
}

/// Interpret a value the way a form would have submitted it.
///
/// `true`/`false` become booleans, numbers become integers or floats,
/// `[a,b]` becomes a list and double quotes force plain text.
#[must_use]
pub fn parse_value(value: &str) -> FieldValue {
    if let Some(quoted) = value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        return FieldValue::Text(quoted.to_string());
    }
    if let Some(inner) = value.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
        return FieldValue::List(
            inner
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        );
    }
    match value {
        "true" => return FieldValue::Bool(true),
        "false" => return FieldValue::Bool(false),
        _ => {}
    }
    if let Ok(n) = value.parse::<i64>() {
        return FieldValue::Integer(n);
    }
    if value.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(x) = value.parse::<f64>() {
            if x.is_finite() {
                return FieldValue::Float(x);
            }
        }
    }
    FieldValue::Text(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_parse_field() {
        let (key, value) = parse_field("title=Visit campus").unwrap();
        assert_eq!(key, "title");
        assert_eq!(value, FieldValue::Text("Visit campus".to_string()));

        // only the first '=' splits
        let (_, value) = parse_field("notes=a=b").unwrap();
        assert_eq!(value, FieldValue::Text("a=b".to_string()));
    }

    #[test]
    fn test_parse_field_errors() {
        assert!(parse_field("no-equals").is_err());
        assert!(parse_field("=value").is_err());
    }

    #[test]
    fn test_parse_value_scalars() {
        assert_eq!(parse_value("true"), FieldValue::Bool(true));
        assert_eq!(parse_value("false"), FieldValue::Bool(false));
        assert_eq!(parse_value("42"), FieldValue::Integer(42));
        assert_eq!(parse_value("-3"), FieldValue::Integer(-3));
        assert_eq!(parse_value("2.5"), FieldValue::Float(2.5));
        assert_eq!(parse_value(""), FieldValue::Text(String::new()));
    }

    #[test]
    fn test_parse_value_text_lookalikes() {
        assert_eq!(parse_value("inf"), FieldValue::Text("inf".to_string()));
        assert_eq!(parse_value("NaN"), FieldValue::Text("NaN".to_string()));
        assert_eq!(parse_value("\"42\""), FieldValue::Text("42".to_string()));
        assert_eq!(
            parse_value("2024-06-01"),
            FieldValue::Text("2024-06-01".to_string())
        );
    }

    #[test]
    fn test_parse_value_list() {
        assert_eq!(
            parse_value("[Kerala, Goa ,]"),
            FieldValue::List(vec!["Kerala".to_string(), "Goa".to_string()])
        );
        assert_eq!(parse_value("[]"), FieldValue::List(Vec::new()));
    }

    #[test]
    fn test_record_from_fields_keeps_order() {
        let record = record_from_fields(vec![
            parse_field("task=Call").unwrap(),
            parse_field("assigned_to=anna").unwrap(),
            parse_field("priority=1").unwrap(),
        ]);
        assert_eq!(
            record.fields().collect::<Vec<_>>(),
            vec!["task", "assigned_to", "priority"]
        );
    }
}
