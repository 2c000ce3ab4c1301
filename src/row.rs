//! Row types read from user and mapping tables

use rusqlite::types::ValueRef;
use serde::{Deserialize, Serialize};

/// A dynamically typed SQLite value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Value::Blob(v.to_vec()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{}", v),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// A row of a user table, columns in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRow {
    pub table_name: String,
    /// Primary key value
    pub id: i64,
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl UserRow {
    /// Value of a column (case-insensitive lookup)
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|i| &self.values[i])
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Iterate `(column, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }
}

/// A row of a mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappingRow {
    pub base_id: i64,
    pub related_id: i64,
}

impl MappingRow {
    pub fn new(base_id: i64, related_id: i64) -> Self {
        Self { base_id, related_id }
    }
}

/// Typed view over a media table row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRow {
    pub id: i64,
    pub data: Vec<u8>,
    pub content_type: String,
}

impl TryFrom<&UserRow> for MediaRow {
    type Error = crate::Error;

    fn try_from(row: &UserRow) -> crate::Result<Self> {
        let data = row
            .get("data")
            .and_then(Value::as_blob)
            .ok_or_else(|| crate::Error::InvalidTable(format!("{} row {} has no media data", row.table_name, row.id)))?;
        let content_type = row
            .get("content_type")
            .and_then(Value::as_str)
            .ok_or_else(|| crate::Error::InvalidTable(format!("{} row {} has no content type", row.table_name, row.id)))?;
        Ok(Self {
            id: row.id,
            data: data.to_vec(),
            content_type: content_type.to_string(),
        })
    }
}
