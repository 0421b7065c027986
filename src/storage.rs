use std::sync::Arc;

pub use walletdb_core::storage::{StorageBackend, StorageError, TransactionId};
pub use walletdb_memory::InMemoryStorage;
pub use walletdb_postgres::PostgresStorage;
pub use walletdb_sqlite::SqliteStorage;

use walletdb_core::{init_schema, Dialect};

use crate::config::DatabaseConfig;

/// Opens the backend for the configured dialect. The JSON column strategy is
/// fixed by the dialect here and never changes for the life of the backend.
pub fn open_backend(config: &DatabaseConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend: Arc<dyn StorageBackend> = match config.dialect {
        Dialect::Sqlite => Arc::new(SqliteStorage::open(&config.url, config.enforce_foreign_keys)?),
        Dialect::Postgres => Arc::new(PostgresStorage::new(&config.url)?),
    };
    tracing::info!(dialect = %config.dialect, "Storage backend opened");
    Ok(backend)
}

/// Opens the configured backend and creates any missing ledger tables.
pub fn open_and_init(config: &DatabaseConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    let backend = open_backend(config)?;
    init_schema(backend.as_ref())?;
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_sqlite_in_memory() {
        let config = DatabaseConfig {
            dialect: Dialect::Sqlite,
            url: ":memory:".to_string(),
            enforce_foreign_keys: true,
        };
        let backend = open_and_init(&config).unwrap();
        assert_eq!(backend.count(&walletdb_core::schema::USER).unwrap(), 0);
    }

    #[test]
    fn test_open_postgres_bad_url() {
        let config = DatabaseConfig {
            dialect: Dialect::Postgres,
            url: "not a connection string".to_string(),
            enforce_foreign_keys: true,
        };
        assert!(matches!(open_backend(&config), Err(StorageError::Connection(_))));
    }
}
