//! JSON column handling shared by both dialects.
//!
//! SQLite has no JSON storage type, so values are written as text and parsed
//! on the way back out. PostgreSQL stores them in its native `JSON` column
//! and the driver hands the value through untouched.

use serde_json::Value;

use crate::{dialect::Dialect, storage::StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonStorage {
    Text,
    Native,
}

/// The shape a JSON value takes on the wire to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonCell {
    Text(String),
    Native(Value),
}

impl JsonStorage {
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Sqlite => JsonStorage::Text,
            Dialect::Postgres => JsonStorage::Native,
        }
    }

    pub fn encode(&self, value: &Value) -> Result<JsonCell, StorageError> {
        match self {
            JsonStorage::Text => Ok(JsonCell::Text(serde_json::to_string(value)?)),
            JsonStorage::Native => Ok(JsonCell::Native(value.clone())),
        }
    }

    pub fn decode(&self, cell: JsonCell) -> Result<Value, StorageError> {
        match cell {
            JsonCell::Text(text) => Ok(serde_json::from_str(&text)?),
            JsonCell::Native(value) => Ok(value),
        }
    }
}
