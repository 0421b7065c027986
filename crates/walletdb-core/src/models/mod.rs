use std::{collections::BTreeMap, fmt::Display};

use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::{schema::TableSchema, storage::StorageError};

pub mod notification;
pub mod transaction;
pub mod user;
pub mod wallet;

/// Fresh primary key. Callers are free to assign ids any other way.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Bool(bool),
    Float(f64),
    String(String),
    Timestamp(OffsetDateTime),
    Json(serde_json::Value),
}

impl DataValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

impl From<f64> for DataValue {
    fn from(f: f64) -> Self {
        DataValue::Float(f)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

impl From<OffsetDateTime> for DataValue {
    fn from(ts: OffsetDateTime) -> Self {
        DataValue::Timestamp(ts)
    }
}

impl From<serde_json::Value> for DataValue {
    fn from(v: serde_json::Value) -> Self {
        DataValue::Json(v)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => DataValue::Null,
        }
    }
}

impl Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result: String = match self {
            DataValue::Null => "null".to_string(),
            DataValue::Bool(b) => if *b { "true".to_string() } else { "false".to_string() },
            DataValue::Float(v) => v.to_string(),
            DataValue::String(s) => s.to_string(),
            DataValue::Timestamp(ts) => ts.format(&Rfc3339).unwrap_or_else(|_| ts.to_string()),
            DataValue::Json(v) => v.to_string(),
        };

        f.write_str(&result)
    }
}

/// One table row keyed by column name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: BTreeMap<&'static str, DataValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &'static str, value: impl Into<DataValue>) -> Self {
        self.values.insert(column, value.into());
        self
    }

    pub fn set(&mut self, column: &'static str, value: impl Into<DataValue>) {
        self.values.insert(column, value.into());
    }

    /// Missing columns read as `Null`.
    pub fn get(&self, column: &str) -> &DataValue {
        self.values.get(column).unwrap_or(&DataValue::Null)
    }

    pub fn string(&self, column: &str) -> Result<String, StorageError> {
        self.opt_string(column)?
            .ok_or_else(|| StorageError::conversion(column, "unexpected null"))
    }

    pub fn opt_string(&self, column: &str) -> Result<Option<String>, StorageError> {
        match self.get(column) {
            DataValue::Null => Ok(None),
            DataValue::String(s) => Ok(Some(s.clone())),
            other => Err(StorageError::conversion(column, format!("expected string, got {:?}", other))),
        }
    }

    pub fn opt_float(&self, column: &str) -> Result<Option<f64>, StorageError> {
        match self.get(column) {
            DataValue::Null => Ok(None),
            DataValue::Float(f) => Ok(Some(*f)),
            other => Err(StorageError::conversion(column, format!("expected float, got {:?}", other))),
        }
    }

    pub fn opt_bool(&self, column: &str) -> Result<Option<bool>, StorageError> {
        match self.get(column) {
            DataValue::Null => Ok(None),
            DataValue::Bool(b) => Ok(Some(*b)),
            other => Err(StorageError::conversion(column, format!("expected boolean, got {:?}", other))),
        }
    }

    pub fn opt_timestamp(&self, column: &str) -> Result<Option<OffsetDateTime>, StorageError> {
        match self.get(column) {
            DataValue::Null => Ok(None),
            DataValue::Timestamp(ts) => Ok(Some(*ts)),
            other => Err(StorageError::conversion(column, format!("expected timestamp, got {:?}", other))),
        }
    }

    pub fn opt_json(&self, column: &str) -> Result<Option<serde_json::Value>, StorageError> {
        match self.get(column) {
            DataValue::Null => Ok(None),
            DataValue::Json(v) => Ok(Some(v.clone())),
            other => Err(StorageError::conversion(column, format!("expected json, got {:?}", other))),
        }
    }
}

/// A struct persisted as one row of a [`TableSchema`].
pub trait Entity: Clone {
    fn schema() -> &'static TableSchema;
    fn id(&self) -> &str;
    fn to_row(&self) -> Row;
    fn from_row(row: &Row) -> Result<Self, StorageError>;
    /// Set once the entity has been stored. `None` means it never was.
    fn created_at(&self) -> Option<OffsetDateTime>;
    /// Sets the creation timestamp if unset and refreshes the modification one.
    fn stamp(&mut self, now: OffsetDateTime);
}
