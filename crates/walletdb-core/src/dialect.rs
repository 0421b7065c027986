use std::{fmt::Display, str::FromStr};

use serde::Deserialize;
use thiserror::Error;

use crate::schema::ColumnType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized database dialect '{0}' (expected 'sqlite' or 'postgresql')")]
pub struct UnknownDialect(pub String);

/// The relational engine a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgresql",
        }
    }

    /// Positional parameter marker, 1-based.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => format!("?{}", n),
            Dialect::Postgres => format!("${}", n),
        }
    }

    pub fn column_type(&self, column_type: ColumnType) -> String {
        match (self, column_type) {
            (_, ColumnType::String(Some(len))) => format!("VARCHAR({})", len),
            (_, ColumnType::String(None)) => "VARCHAR".to_string(),
            (Dialect::Sqlite, ColumnType::Float) => "REAL".to_string(),
            (Dialect::Postgres, ColumnType::Float) => "DOUBLE PRECISION".to_string(),
            (_, ColumnType::Boolean) => "BOOLEAN".to_string(),
            (Dialect::Sqlite, ColumnType::Timestamp) => "DATETIME".to_string(),
            (Dialect::Postgres, ColumnType::Timestamp) => "TIMESTAMP WITHOUT TIME ZONE".to_string(),
            (Dialect::Sqlite, ColumnType::Json) => "TEXT".to_string(),
            (Dialect::Postgres, ColumnType::Json) => "JSON".to_string(),
        }
    }
}

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgresql" | "postgres" => Ok(Dialect::Postgres),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}

impl TryFrom<String> for Dialect {
    type Error = UnknownDialect;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
