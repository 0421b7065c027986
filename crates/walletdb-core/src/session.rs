//! Unit of work over a [`StorageBackend`].
//!
//! Changes are staged on a [`Session`] and applied together by
//! [`Session::commit`] inside one storage transaction. If any staged change
//! fails, the transaction is rolled back and every staged change is
//! discarded, not just the one that failed.

use std::sync::Arc;

use time::OffsetDateTime;

use crate::{
    models::{Entity, Row},
    schema::TableSchema,
    storage::{check_column, StorageBackend, StorageError, TransactionId},
};

#[derive(Debug)]
enum PendingOp {
    Insert { table: &'static TableSchema, row: Row },
    Update { table: &'static TableSchema, row: Row },
    Delete { table: &'static TableSchema, id: String },
}

pub struct Session {
    backend: Arc<dyn StorageBackend>,
    pending: Vec<PendingOp>,
}

impl Session {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            pending: Vec::new(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Stages an insert for an entity that was never stored, an update
    /// otherwise. `entity` is left untouched; the returned copy carries the
    /// timestamps that will be written.
    pub fn add<T: Entity>(&mut self, entity: &T) -> T {
        let mut staged = entity.clone();
        staged.stamp(OffsetDateTime::now_utc());
        let table = T::schema();
        let row = staged.to_row();
        self.pending.push(match entity.created_at() {
            None => PendingOp::Insert { table, row },
            Some(_) => PendingOp::Update { table, row },
        });
        staged
    }

    pub fn remove<T: Entity>(&mut self, entity: &T) {
        self.pending.push(PendingOp::Delete {
            table: T::schema(),
            id: entity.id().to_string(),
        });
    }

    /// Number of staged, uncommitted changes.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn commit(&mut self) -> Result<(), StorageError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let ops = std::mem::take(&mut self.pending);
        match self.apply(&ops) {
            Ok(()) => {
                metrics::increment_counter!("walletdb_commits_total");
                Ok(())
            }
            Err(e) => {
                metrics::increment_counter!("walletdb_rollbacks_total");
                tracing::warn!(error = %e, discarded = ops.len(), "Unit of work rolled back");
                Err(e)
            }
        }
    }

    /// Discards staged changes.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }

    pub fn find<T: Entity>(&self, id: &str) -> Result<Option<T>, StorageError> {
        self.backend
            .find(T::schema(), id)?
            .map(|row| T::from_row(&row))
            .transpose()
    }

    /// Rows of `T` whose `column` equals `value`, ordered by id.
    pub fn find_by<T: Entity>(&self, column: &str, value: &str) -> Result<Vec<T>, StorageError> {
        check_column(T::schema(), column)?;
        self.backend
            .find_by(T::schema(), column, value)?
            .iter()
            .map(T::from_row)
            .collect()
    }

    pub fn count<T: Entity>(&self) -> Result<u64, StorageError> {
        self.backend.count(T::schema())
    }

    fn apply(&self, ops: &[PendingOp]) -> Result<(), StorageError> {
        let tx = TxGuard::begin(self.backend.as_ref())?;
        for op in ops {
            match op {
                PendingOp::Insert { table, row } => self.backend.insert(table, row)?,
                PendingOp::Update { table, row } => self.backend.update(table, row)?,
                PendingOp::Delete { table, id } => self.backend.delete(table, id)?,
            }
        }
        tx.commit()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::warn!(discarded = self.pending.len(), "Session dropped with uncommitted changes");
        }
    }
}

/// Rolls the transaction back unless `commit` succeeded.
struct TxGuard<'a> {
    backend: &'a dyn StorageBackend,
    tx_id: TransactionId,
    done: bool,
}

impl<'a> TxGuard<'a> {
    fn begin(backend: &'a dyn StorageBackend) -> Result<Self, StorageError> {
        let tx_id = backend.begin_transaction()?;
        Ok(Self {
            backend,
            tx_id,
            done: false,
        })
    }

    fn commit(mut self) -> Result<(), StorageError> {
        self.backend.commit_transaction(self.tx_id)?;
        self.done = true;
        Ok(())
    }
}

impl Drop for TxGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = self.backend.rollback_transaction(self.tx_id) {
                tracing::error!(tx_id = self.tx_id, error = %e, "Rollback failed");
            }
        }
    }
}

/// Save and delete for every entity type.
///
/// Both return the captured error instead of panicking. A failure rolls back
/// the session's whole unit of work, including changes staged with
/// [`Session::add`] or [`Session::remove`] before the call.
pub trait Persistable: Entity {
    /// Timestamps on `self` change only when the commit succeeds.
    fn save(&mut self, session: &mut Session) -> Result<(), StorageError> {
        let staged = session.add(&*self);
        session.commit()?;
        *self = staged;
        Ok(())
    }

    fn delete(&self, session: &mut Session) -> Result<(), StorageError> {
        session.remove(self);
        session.commit()
    }
}

impl<T: Entity> Persistable for T {}
