//! Row filters: equality and membership
//!
//! Keys compare by their string form so that `"42"` and `42` match, which is
//! how the hosted backend treats text primary keys.

use serde_json::Value;

use crate::models::record::{Record, ID_COLUMN, OWNER_COLUMN};
use crate::models::OwnerId;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every row
    All,
    /// `column = value`
    Eq { column: String, value: Value },
    /// `column IN (values)`
    In { column: String, values: Vec<Value> },
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `id = <id>`
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::eq(ID_COLUMN, id.into())
    }

    /// `user_id = <owner>`
    pub fn owned_by(owner: OwnerId) -> Self {
        Self::eq(OWNER_COLUMN, owner.to_string())
    }

    /// True when a membership filter has nothing to match
    pub fn is_empty_membership(&self) -> bool {
        matches!(self, Filter::In { values, .. } if values.is_empty())
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { column, value } => column_matches(record, column, value),
            Filter::In { column, values } => {
                values.iter().any(|value| column_matches(record, column, value))
            }
        }
    }
}

fn column_matches(record: &Record, column: &str, expected: &Value) -> bool {
    match (record.get(column), key_of(expected)) {
        (Some(actual), Some(expected_key)) => key_of(actual).as_deref() == Some(&*expected_key),
        (Some(actual), None) => actual == expected,
        (None, _) => expected.is_null(),
    }
}

fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
