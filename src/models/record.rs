//! Entity records as schemaless rows
//!
//! The backend enforces column types, so records travel as JSON objects.
//! These helpers read and rewrite the few columns the engine cares about.

use serde_json::{Map, Value};

/// A single row from any collection
pub type Record = Map<String, Value>;

/// Primary key column name shared by every collection
pub const ID_COLUMN: &str = "id";

/// Ownership column on owner-scoped collections
pub const OWNER_COLUMN: &str = "user_id";

/// Last-modified column used by sync conflict detection
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Read a column as a string key; numbers are accepted and stringified
pub fn string_field(record: &Record, column: &str) -> Option<String> {
    match record.get(column)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Primary key of a record
pub fn record_id(record: &Record) -> Option<String> {
    string_field(record, ID_COLUMN)
}

pub fn set_string(record: &mut Record, column: &str, value: impl Into<String>) {
    record.insert(column.to_string(), Value::String(value.into()));
}

/// Build a record from a `json!` object literal
///
/// Non-object values produce an empty record.
pub fn from_value(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
