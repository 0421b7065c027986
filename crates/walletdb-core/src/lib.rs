//! Core types and traits for walletdb storage backends.
//!
//! This crate declares the ledger entities (users, wallets, transactions and
//! notifications), the table schemas they persist to, the `StorageBackend`
//! trait implemented by the backend crates, and the `Session` unit of work
//! through which entities are saved and deleted.

pub mod dialect;
pub mod json;
pub mod models;
pub mod schema;
pub mod session;
pub mod sql;
pub mod storage;

// Re-export key types at crate root for convenience
pub use dialect::{Dialect, UnknownDialect};
pub use json::{JsonCell, JsonStorage};
pub use models::{DataValue, Entity, Row, new_id};
pub use models::notification::Notification;
pub use models::transaction::Transaction;
pub use models::user::User;
pub use models::wallet::Wallet;
pub use schema::{ColumnDef, ColumnType, ForeignKey, TableSchema};
pub use session::{Persistable, Session};
pub use storage::{init_schema, StorageBackend, StorageError, TransactionId, TransactionSlot};
