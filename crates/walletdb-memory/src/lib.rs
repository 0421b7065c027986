//! In-memory storage backend for walletdb.
//!
//! Enforces primary keys, `NOT NULL` and `UNIQUE` from the table schemas.
//! Foreign keys are not checked. Transactions snapshot every table on begin
//! and restore the snapshot on rollback.

use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError, RwLock},
};

use walletdb_core::{DataValue, Row, StorageBackend, StorageError, TableSchema, TransactionId, TransactionSlot};

type Table = BTreeMap<String, Row>;

pub struct InMemoryStorage {
    tables: RwLock<BTreeMap<&'static str, Table>>,
    tx_slot: TransactionSlot,
    snapshot: Mutex<Option<BTreeMap<&'static str, Table>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Other("storage lock poisoned".to_string())
}

fn no_such_table(table: &TableSchema) -> StorageError {
    StorageError::Other(format!("no such table: {}", table.name))
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
            tx_slot: TransactionSlot::new(),
            snapshot: Mutex::new(None),
        }
    }

    fn row_id(table: &TableSchema, row: &Row) -> Result<String, StorageError> {
        let pk = table.primary_key().name;
        match row.get(pk) {
            DataValue::String(id) => Ok(id.clone()),
            DataValue::Null => Err(StorageError::ConstraintViolation(format!(
                "NOT NULL constraint failed: {}.{}",
                table.name, pk
            ))),
            other => Err(StorageError::conversion(pk, format!("expected string, got {:?}", other))),
        }
    }

    fn check_constraints(table: &TableSchema, rows: &Table, id: &str, row: &Row) -> Result<(), StorageError> {
        for column in table.columns {
            let value = row.get(column.name);
            if value.is_null() {
                if !column.nullable {
                    return Err(StorageError::ConstraintViolation(format!(
                        "NOT NULL constraint failed: {}.{}",
                        table.name, column.name
                    )));
                }
                continue;
            }
            if column.unique && rows.iter().any(|(other_id, other)| other_id != id && other.get(column.name) == value) {
                return Err(StorageError::ConstraintViolation(format!(
                    "UNIQUE constraint failed: {}.{}",
                    table.name, column.name
                )));
            }
        }
        Ok(())
    }
}

impl StorageBackend for InMemoryStorage {
    fn create_table(&self, table: &TableSchema) -> Result<(), StorageError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.entry(table.name).or_default();
        Ok(())
    }

    fn insert(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError> {
        let id = Self::row_id(table, row)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.get_mut(table.name).ok_or_else(|| no_such_table(table))?;
        if rows.contains_key(&id) {
            return Err(StorageError::ConstraintViolation(format!(
                "UNIQUE constraint failed: {}.{}",
                table.name,
                table.primary_key().name
            )));
        }
        Self::check_constraints(table, rows, &id, row)?;
        rows.insert(id, row.clone());
        Ok(())
    }

    fn update(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError> {
        let id = Self::row_id(table, row)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.get_mut(table.name).ok_or_else(|| no_such_table(table))?;
        let mut merged = rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(table, &id))?;
        for column in table.updatable_columns() {
            merged.set(column.name, row.get(column.name).clone());
        }
        Self::check_constraints(table, rows, &id, &merged)?;
        rows.insert(id, merged);
        Ok(())
    }

    fn delete(&self, table: &TableSchema, id: &str) -> Result<(), StorageError> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let rows = tables.get_mut(table.name).ok_or_else(|| no_such_table(table))?;
        rows.remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(table, id))
    }

    fn find(&self, table: &TableSchema, id: &str) -> Result<Option<Row>, StorageError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let rows = tables.get(table.name).ok_or_else(|| no_such_table(table))?;
        Ok(rows.get(id).cloned())
    }

    fn find_by(&self, table: &TableSchema, column: &str, value: &str) -> Result<Vec<Row>, StorageError> {
        walletdb_core::storage::check_column(table, column)?;
        let tables = self.tables.read().map_err(poisoned)?;
        let rows = tables.get(table.name).ok_or_else(|| no_such_table(table))?;
        Ok(rows
            .values()
            .filter(|row| matches!(row.get(column), DataValue::String(s) if s == value))
            .cloned()
            .collect())
    }

    fn count(&self, table: &TableSchema) -> Result<u64, StorageError> {
        let tables = self.tables.read().map_err(poisoned)?;
        let rows = tables.get(table.name).ok_or_else(|| no_such_table(table))?;
        Ok(rows.len() as u64)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_slot.acquire()?;
        let tables = match self.tables.read() {
            Ok(tables) => tables.clone(),
            Err(e) => {
                self.tx_slot.release(tx_id);
                return Err(poisoned(e));
            }
        };
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(tables);
        tracing::debug!(tx_id, "Transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.tx_slot.check(tx_id)?;
        *self.snapshot.lock().map_err(poisoned)? = None;
        self.tx_slot.release(tx_id);
        tracing::debug!(tx_id, "Transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.tx_slot.check(tx_id)?;
        let restored = self.snapshot.lock().map_err(poisoned)?.take();
        if let Some(tables) = restored {
            *self.tables.write().map_err(poisoned)? = tables;
        }
        self.tx_slot.release(tx_id);
        tracing::debug!(tx_id, "Transaction rolled back");
        Ok(())
    }
}
