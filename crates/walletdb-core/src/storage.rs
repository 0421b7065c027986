use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Condvar, Mutex, PoisonError,
    },
    thread::{self, ThreadId},
};

use crate::{
    models::Row,
    schema::{TableSchema, ALL_TABLES},
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Unique, not-null or foreign-key constraint rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("{table} not found: {id}")]
    NotFound { table: String, id: String },
    #[error("invalid value for column {column}: {message}")]
    Conversion { column: String, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown column {column} on {table}")]
    UnknownColumn { table: String, column: String },
    #[error("no active transaction")]
    NoActiveTransaction,
    #[error("a transaction is already in progress")]
    TransactionInProgress,
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    pub fn conversion(column: &str, message: impl ToString) -> Self {
        StorageError::Conversion {
            column: column.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found(table: &TableSchema, id: &str) -> Self {
        StorageError::NotFound {
            table: table.name.to_string(),
            id: id.to_string(),
        }
    }
}

pub type TransactionId = u64;

/// A relational store holding rows shaped by [`TableSchema`]s.
///
/// Writes outside `begin_transaction`/`commit_transaction` are applied
/// immediately. Only one transaction may be open per backend at a time;
/// `begin_transaction` from another thread blocks until it ends.
pub trait StorageBackend: Send + Sync {
    fn create_table(&self, table: &TableSchema) -> Result<(), StorageError>;
    /// Fails with `ConstraintViolation` when the primary key is taken.
    fn insert(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError>;
    /// Writes the updatable columns of an existing row. Fails with `NotFound`
    /// when no row has the row's id.
    fn update(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError>;
    /// Fails with `NotFound` when no row has the given id.
    fn delete(&self, table: &TableSchema, id: &str) -> Result<(), StorageError>;
    fn find(&self, table: &TableSchema, id: &str) -> Result<Option<Row>, StorageError>;
    fn find_by(&self, table: &TableSchema, column: &str, value: &str) -> Result<Vec<Row>, StorageError>;
    fn count(&self, table: &TableSchema) -> Result<u64, StorageError>;

    fn begin_transaction(&self) -> Result<TransactionId, StorageError>;
    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError>;
}

/// Creates every ledger table that does not exist yet.
pub fn init_schema(backend: &dyn StorageBackend) -> Result<(), StorageError> {
    for table in ALL_TABLES {
        backend.create_table(table)?;
    }
    tracing::debug!(tables = ALL_TABLES.len(), "Schema initialized");
    Ok(())
}

/// The one open transaction a backend allows.
///
/// `acquire` blocks while another thread holds the slot. A second `acquire`
/// from the holding thread fails with `TransactionInProgress` instead of
/// deadlocking.
#[derive(Debug)]
pub struct TransactionSlot {
    active: Mutex<Option<(TransactionId, ThreadId)>>,
    released: Condvar,
    counter: AtomicU64,
}

impl Default for TransactionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionSlot {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            released: Condvar::new(),
            counter: AtomicU64::new(1),
        }
    }

    pub fn acquire(&self) -> Result<TransactionId, StorageError> {
        let me = thread::current().id();
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *active {
                None => break,
                Some((_, owner)) if owner == me => return Err(StorageError::TransactionInProgress),
                Some(_) => {
                    active = self
                        .released
                        .wait(active)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        let tx_id = self.counter.fetch_add(1, Ordering::SeqCst);
        *active = Some((tx_id, me));
        Ok(tx_id)
    }

    /// Fails with `NoActiveTransaction` unless `tx_id` holds the slot.
    pub fn check(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        match *active {
            Some((current, _)) if current == tx_id => Ok(()),
            _ => Err(StorageError::NoActiveTransaction),
        }
    }

    /// Frees the slot if `tx_id` holds it and wakes one waiter.
    pub fn release(&self, tx_id: TransactionId) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*active, Some((current, _)) if current == tx_id) {
            *active = None;
            self.released.notify_one();
        }
    }
}

pub fn check_column(table: &TableSchema, column: &str) -> Result<(), StorageError> {
    match table.column(column) {
        Some(_) => Ok(()),
        None => Err(StorageError::UnknownColumn {
            table: table.name.to_string(),
            column: column.to_string(),
        }),
    }
}
