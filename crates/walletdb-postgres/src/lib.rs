//! PostgreSQL storage backend for walletdb.
//!
//! JSON columns use the native `JSON` type. Timestamps are stored as
//! `TIMESTAMP WITHOUT TIME ZONE` holding UTC wall-clock time.

use std::sync::{Mutex, MutexGuard, PoisonError};

use postgres::{error::SqlState, types::ToSql, Client, NoTls};
use serde_json::Value;
use time::{PrimitiveDateTime, UtcOffset};

use walletdb_core::{
    sql, storage::check_column, ColumnDef, ColumnType, DataValue, Dialect, JsonCell, JsonStorage, Row,
    StorageBackend, StorageError, TableSchema, TransactionId, TransactionSlot,
};

type Param = Box<dyn ToSql + Sync>;

pub struct PostgresStorage {
    client: Mutex<Client>,
    json: JsonStorage,
    tx_slot: TransactionSlot,
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Other("PostgreSQL client lock poisoned".to_string())
}

fn pg_err(e: postgres::Error) -> StorageError {
    if e.is_closed() {
        return StorageError::Connection(e.to_string());
    }
    match e.code() {
        Some(code)
            if *code == SqlState::UNIQUE_VIOLATION
                || *code == SqlState::NOT_NULL_VIOLATION
                || *code == SqlState::FOREIGN_KEY_VIOLATION
                || *code == SqlState::CHECK_VIOLATION =>
        {
            let message = e
                .as_db_error()
                .map(|db| db.message().to_string())
                .unwrap_or_else(|| e.to_string());
            StorageError::ConstraintViolation(message)
        }
        _ => StorageError::Other(e.to_string()),
    }
}

impl PostgresStorage {
    pub fn new(connection_string: &str) -> Result<Self, StorageError> {
        let client = Client::connect(connection_string, NoTls)
            .map_err(|e| StorageError::Connection(format!("PostgreSQL connection failed: {}", e)))?;
        tracing::debug!("PostgreSQL storage connected");

        Ok(Self {
            client: Mutex::new(client),
            json: JsonStorage::for_dialect(Dialect::Postgres),
            tx_slot: TransactionSlot::new(),
        })
    }

    fn client(&self) -> Result<MutexGuard<'_, Client>, StorageError> {
        self.client.lock().map_err(poisoned)
    }

    /// Binds `value` with the Rust type matching the column, so NULLs are
    /// typed too.
    fn encode(&self, column: &ColumnDef, value: &DataValue) -> Result<Param, StorageError> {
        let mismatch = || {
            StorageError::conversion(
                column.name,
                format!("cannot store {:?} as {:?}", value, column.column_type),
            )
        };

        let param: Param = match (column.column_type, value) {
            (ColumnType::String(_), DataValue::Null) => Box::new(None::<String>),
            (ColumnType::String(_), DataValue::String(s)) => Box::new(s.clone()),
            (ColumnType::Float, DataValue::Null) => Box::new(None::<f64>),
            (ColumnType::Float, DataValue::Float(f)) => Box::new(*f),
            (ColumnType::Boolean, DataValue::Null) => Box::new(None::<bool>),
            (ColumnType::Boolean, DataValue::Bool(b)) => Box::new(*b),
            (ColumnType::Timestamp, DataValue::Null) => Box::new(None::<PrimitiveDateTime>),
            (ColumnType::Timestamp, DataValue::Timestamp(ts)) => {
                let utc = ts.to_offset(UtcOffset::UTC);
                Box::new(PrimitiveDateTime::new(utc.date(), utc.time()))
            }
            (ColumnType::Json, DataValue::Null) => Box::new(None::<Value>),
            (ColumnType::Json, DataValue::Json(v)) => match self.json.encode(v)? {
                JsonCell::Native(v) => Box::new(v),
                JsonCell::Text(text) => Box::new(serde_json::from_str::<Value>(&text)?),
            },
            _ => return Err(mismatch()),
        };
        Ok(param)
    }

    fn decode(&self, column: &ColumnDef, row: &postgres::Row, idx: usize) -> Result<DataValue, StorageError> {
        let conv = |e: postgres::Error| StorageError::conversion(column.name, e);
        let value: DataValue = match column.column_type {
            ColumnType::String(_) => row.try_get::<_, Option<String>>(idx).map_err(conv)?.into(),
            ColumnType::Float => row.try_get::<_, Option<f64>>(idx).map_err(conv)?.into(),
            ColumnType::Boolean => row.try_get::<_, Option<bool>>(idx).map_err(conv)?.into(),
            ColumnType::Timestamp => row
                .try_get::<_, Option<PrimitiveDateTime>>(idx)
                .map_err(conv)?
                .map(PrimitiveDateTime::assume_utc)
                .into(),
            ColumnType::Json => match row.try_get::<_, Option<Value>>(idx).map_err(conv)? {
                Some(v) => DataValue::Json(self.json.decode(JsonCell::Native(v))?),
                None => DataValue::Null,
            },
        };
        Ok(value)
    }

    fn query_rows(&self, table: &TableSchema, query: &str, key: &str) -> Result<Vec<Row>, StorageError> {
        let rows = self.client()?.query(query, &[&key]).map_err(pg_err)?;
        rows.iter()
            .map(|pg_row| {
                let mut row = Row::new();
                for (idx, column) in table.columns.iter().enumerate() {
                    row.set(column.name, self.decode(column, pg_row, idx)?);
                }
                Ok(row)
            })
            .collect()
    }
}

impl StorageBackend for PostgresStorage {
    fn create_table(&self, table: &TableSchema) -> Result<(), StorageError> {
        self.client()?
            .batch_execute(&sql::create_table(table, Dialect::Postgres))
            .map_err(pg_err)
    }

    fn insert(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError> {
        let params = table
            .columns
            .iter()
            .map(|c| self.encode(c, row.get(c.name)))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();

        self.client()?
            .execute(&sql::insert(table, Dialect::Postgres), &refs)
            .map_err(pg_err)?;
        Ok(())
    }

    fn update(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError> {
        let pk = table.primary_key();
        let params = table
            .updatable_columns()
            .chain(std::iter::once(pk))
            .map(|c| self.encode(c, row.get(c.name)))
            .collect::<Result<Vec<_>, _>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref()).collect();

        let updated = self
            .client()?
            .execute(&sql::update_by_id(table, Dialect::Postgres), &refs)
            .map_err(pg_err)?;
        if updated == 0 {
            return Err(StorageError::not_found(table, &row.get(pk.name).to_string()));
        }
        Ok(())
    }

    fn delete(&self, table: &TableSchema, id: &str) -> Result<(), StorageError> {
        let deleted = self
            .client()?
            .execute(&sql::delete_by_id(table, Dialect::Postgres), &[&id])
            .map_err(pg_err)?;
        if deleted == 0 {
            return Err(StorageError::not_found(table, id));
        }
        Ok(())
    }

    fn find(&self, table: &TableSchema, id: &str) -> Result<Option<Row>, StorageError> {
        let rows = self.query_rows(table, &sql::select_by_id(table, Dialect::Postgres), id)?;
        Ok(rows.into_iter().next())
    }

    fn find_by(&self, table: &TableSchema, column: &str, value: &str) -> Result<Vec<Row>, StorageError> {
        check_column(table, column)?;
        self.query_rows(table, &sql::select_where(table, column, Dialect::Postgres), value)
    }

    fn count(&self, table: &TableSchema) -> Result<u64, StorageError> {
        let row = self
            .client()?
            .query_one(&sql::count(table), &[])
            .map_err(pg_err)?;
        let count: i64 = row.try_get(0).map_err(pg_err)?;
        Ok(count as u64)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_slot.acquire()?;
        let started = self
            .client()
            .and_then(|mut client| client.batch_execute("BEGIN").map_err(pg_err));
        if let Err(e) = started {
            self.tx_slot.release(tx_id);
            return Err(e);
        }
        tracing::debug!(tx_id, "PostgreSQL transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.tx_slot.check(tx_id)?;
        self.client()?.batch_execute("COMMIT").map_err(pg_err)?;
        self.tx_slot.release(tx_id);
        tracing::debug!(tx_id, "PostgreSQL transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.tx_slot.check(tx_id)?;
        self.client()?.batch_execute("ROLLBACK").map_err(pg_err)?;
        self.tx_slot.release(tx_id);
        tracing::debug!(tx_id, "PostgreSQL transaction rolled back");
        Ok(())
    }
}
