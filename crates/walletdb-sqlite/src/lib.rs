//! SQLite storage backend for walletdb.
//!
//! JSON columns are stored as `TEXT` and timestamps as RFC 3339 text in UTC.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, params_from_iter, types::Value, Connection, ErrorCode};
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};

use walletdb_core::{
    sql, storage::check_column, ColumnDef, ColumnType, DataValue, Dialect, JsonCell, JsonStorage, Row,
    StorageBackend, StorageError, TableSchema, TransactionId, TransactionSlot,
};

pub struct SqliteStorage {
    conn: Mutex<Connection>,
    json: JsonStorage,
    tx_slot: TransactionSlot,
}

fn poisoned<T>(_: PoisonError<T>) -> StorageError {
    StorageError::Other("SQLite connection lock poisoned".to_string())
}

fn sql_err(e: rusqlite::Error) -> StorageError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg) => match err.code {
            ErrorCode::ConstraintViolation => {
                StorageError::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure => StorageError::Connection(e.to_string()),
            _ => StorageError::Other(e.to_string()),
        },
        _ => StorageError::Other(e.to_string()),
    }
}

impl SqliteStorage {
    /// Opens `path` (or an in-memory database for `":memory:"`) with foreign
    /// keys enforced.
    pub fn new(path: &str) -> Result<Self, StorageError> {
        Self::open(path, true)
    }

    pub fn open(path: &str, enforce_foreign_keys: bool) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let foreign_keys = if enforce_foreign_keys { "ON" } else { "OFF" };
        conn.execute_batch(&format!("PRAGMA journal_mode=WAL; PRAGMA foreign_keys={};", foreign_keys))
            .map_err(sql_err)?;
        tracing::debug!(path, enforce_foreign_keys, "SQLite storage opened");

        Ok(Self {
            conn: Mutex::new(conn),
            json: JsonStorage::for_dialect(Dialect::Sqlite),
            tx_slot: TransactionSlot::new(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(poisoned)
    }

    fn encode(&self, column: &ColumnDef, value: &DataValue) -> Result<Value, StorageError> {
        Ok(match value {
            DataValue::Null => Value::Null,
            DataValue::Bool(b) => Value::Integer(i64::from(*b)),
            DataValue::Float(f) => Value::Real(*f),
            DataValue::String(s) => Value::Text(s.clone()),
            DataValue::Timestamp(ts) => Value::Text(
                ts.to_offset(UtcOffset::UTC)
                    .format(&Rfc3339)
                    .map_err(|e| StorageError::conversion(column.name, e))?,
            ),
            DataValue::Json(v) => match self.json.encode(v)? {
                JsonCell::Text(text) => Value::Text(text),
                JsonCell::Native(v) => Value::Text(v.to_string()),
            },
        })
    }

    fn decode(&self, column: &ColumnDef, value: Value) -> Result<DataValue, StorageError> {
        match (column.column_type, value) {
            (_, Value::Null) => Ok(DataValue::Null),
            (ColumnType::String(_), Value::Text(s)) => Ok(DataValue::String(s)),
            (ColumnType::Float, Value::Real(f)) => Ok(DataValue::Float(f)),
            (ColumnType::Float, Value::Integer(i)) => Ok(DataValue::Float(i as f64)),
            (ColumnType::Boolean, Value::Integer(i)) => Ok(DataValue::Bool(i != 0)),
            (ColumnType::Timestamp, Value::Text(s)) => OffsetDateTime::parse(&s, &Rfc3339)
                .map(DataValue::Timestamp)
                .map_err(|e| StorageError::conversion(column.name, e)),
            (ColumnType::Json, Value::Text(s)) => Ok(DataValue::Json(self.json.decode(JsonCell::Text(s))?)),
            (column_type, other) => Err(StorageError::conversion(
                column.name,
                format!("cannot read {:?} as {:?}", other, column_type),
            )),
        }
    }

    fn query_rows(&self, table: &TableSchema, query: &str, id: &str) -> Result<Vec<Row>, StorageError> {
        let raw: Vec<Vec<Value>> = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(query).map_err(sql_err)?;
            let rows = stmt
                .query_map(params![id], |r| {
                    (0..table.columns.len())
                        .map(|i| r.get::<_, Value>(i))
                        .collect::<rusqlite::Result<Vec<Value>>>()
                })
                .map_err(sql_err)?;
            rows.collect::<Result<_, _>>().map_err(sql_err)?
        };

        raw.into_iter()
            .map(|values| {
                let mut row = Row::new();
                for (column, value) in table.columns.iter().zip(values) {
                    row.set(column.name, self.decode(column, value)?);
                }
                Ok(row)
            })
            .collect()
    }
}

impl StorageBackend for SqliteStorage {
    fn create_table(&self, table: &TableSchema) -> Result<(), StorageError> {
        let conn = self.conn()?;
        conn.execute_batch(&sql::create_table(table, Dialect::Sqlite))
            .map_err(sql_err)?;
        Ok(())
    }

    fn insert(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError> {
        let values = table
            .columns
            .iter()
            .map(|c| self.encode(c, row.get(c.name)))
            .collect::<Result<Vec<_>, _>>()?;

        let conn = self.conn()?;
        conn.execute(&sql::insert(table, Dialect::Sqlite), params_from_iter(values.iter()))
            .map_err(sql_err)?;
        Ok(())
    }

    fn update(&self, table: &TableSchema, row: &Row) -> Result<(), StorageError> {
        let pk = table.primary_key();
        let values = table
            .updatable_columns()
            .chain(std::iter::once(pk))
            .map(|c| self.encode(c, row.get(c.name)))
            .collect::<Result<Vec<_>, _>>()?;

        let conn = self.conn()?;
        let updated = conn
            .execute(&sql::update_by_id(table, Dialect::Sqlite), params_from_iter(values.iter()))
            .map_err(sql_err)?;
        if updated == 0 {
            return Err(StorageError::not_found(table, &row.get(pk.name).to_string()));
        }
        Ok(())
    }

    fn delete(&self, table: &TableSchema, id: &str) -> Result<(), StorageError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(&sql::delete_by_id(table, Dialect::Sqlite), params![id])
            .map_err(sql_err)?;
        if deleted == 0 {
            return Err(StorageError::not_found(table, id));
        }
        Ok(())
    }

    fn find(&self, table: &TableSchema, id: &str) -> Result<Option<Row>, StorageError> {
        let rows = self.query_rows(table, &sql::select_by_id(table, Dialect::Sqlite), id)?;
        Ok(rows.into_iter().next())
    }

    fn find_by(&self, table: &TableSchema, column: &str, value: &str) -> Result<Vec<Row>, StorageError> {
        check_column(table, column)?;
        self.query_rows(table, &sql::select_where(table, column, Dialect::Sqlite), value)
    }

    fn count(&self, table: &TableSchema) -> Result<u64, StorageError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(&sql::count(table), [], |r| r.get(0))
            .map_err(sql_err)?;
        Ok(count as u64)
    }

    fn begin_transaction(&self) -> Result<TransactionId, StorageError> {
        let tx_id = self.tx_slot.acquire()?;
        let started = self
            .conn()
            .and_then(|conn| conn.execute_batch("SAVEPOINT walletdb_tx").map_err(sql_err));
        if let Err(e) = started {
            self.tx_slot.release(tx_id);
            return Err(e);
        }
        tracing::debug!(tx_id, "SQLite transaction started");
        Ok(tx_id)
    }

    fn commit_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.tx_slot.check(tx_id)?;
        self.conn()?
            .execute_batch("RELEASE SAVEPOINT walletdb_tx")
            .map_err(sql_err)?;
        self.tx_slot.release(tx_id);
        tracing::debug!(tx_id, "SQLite transaction committed");
        Ok(())
    }

    fn rollback_transaction(&self, tx_id: TransactionId) -> Result<(), StorageError> {
        self.tx_slot.check(tx_id)?;
        self.conn()?
            .execute_batch("ROLLBACK TO SAVEPOINT walletdb_tx; RELEASE SAVEPOINT walletdb_tx")
            .map_err(sql_err)?;
        self.tx_slot.release(tx_id);
        tracing::debug!(tx_id, "SQLite transaction rolled back");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use walletdb_core::{
        init_schema, Entity, Notification, Persistable, Session, Transaction, User, Wallet,
    };

    fn session() -> Session {
        let storage = Arc::new(SqliteStorage::new(":memory:").unwrap());
        init_schema(storage.as_ref()).unwrap();
        Session::new(storage)
    }

    #[test]
    fn test_sqlite_round_trip_all_fields() {
        let mut session = session();
        let mut user = User::new("u1", "Ada", "Obi", "a@x.com");
        user.authorization_code = Some("AUTH_x1".to_string());
        user.authorization_code_status = true;
        user.save(&mut session).unwrap();

        let mut txn = Transaction::new("t1", "Airtime", "debit");
        txn.user_id = Some("u1".to_string());
        txn.cost_of_transaction = 10.25;
        txn.amount_before_transaction = 100.0;
        txn.amount_after_transaction = 89.75;
        txn.paystack_deduction = 0.015;
        txn.save(&mut session).unwrap();

        // RFC 3339 text keeps full precision, so timestamps survive too.
        assert_eq!(session.find::<User>("u1").unwrap().unwrap(), user);
        assert_eq!(session.find::<Transaction>("t1").unwrap().unwrap(), txn);
    }

    #[test]
    fn test_sqlite_duplicate_email_leaves_counts_unchanged() {
        let mut session = session();
        User::new("u1", "Ada", "Obi", "a@x.com").save(&mut session).unwrap();
        let before = session.count::<User>().unwrap();

        let result = User::new("u2", "Bo", "Eze", "a@x.com").save(&mut session);
        match result {
            Err(StorageError::ConstraintViolation(msg)) => assert!(msg.contains("User.email"), "{}", msg),
            other => panic!("expected constraint violation, got {:?}", other),
        }
        assert_eq!(session.count::<User>().unwrap(), before);
    }

    #[test]
    fn test_sqlite_duplicate_authorization_code() {
        let mut session = session();
        let mut ada = User::new("u1", "Ada", "Obi", "a@x.com");
        ada.authorization_code = Some("AUTH_1".to_string());
        ada.save(&mut session).unwrap();

        let mut bo = User::new("u2", "Bo", "Eze", "b@x.com");
        bo.authorization_code = Some("AUTH_1".to_string());
        assert!(bo.save(&mut session).is_err());

        // Absent codes never collide.
        User::new("u3", "Cy", "Eze", "c@x.com").save(&mut session).unwrap();
        User::new("u4", "Di", "Eze", "d@x.com").save(&mut session).unwrap();
    }

    #[test]
    fn test_sqlite_delete() {
        let mut session = session();
        let mut note = Notification::new("n1", "hello");
        note.save(&mut session).unwrap();
        note.delete(&mut session).unwrap();
        assert!(session.find::<Notification>("n1").unwrap().is_none());

        let again = note.delete(&mut session);
        assert!(matches!(again, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn test_sqlite_failed_delete_discards_siblings() {
        let mut session = session();
        let mut wallet = Wallet::new("w1");
        session.add(&wallet);

        let result = User::new("ghost", "No", "Body", "no@x.com").delete(&mut session);
        assert!(result.is_err());
        assert_eq!(session.pending(), 0);
        assert_eq!(session.count::<Wallet>().unwrap(), 0);

        // The connection is usable again after the rollback.
        wallet.save(&mut session).unwrap();
        assert_eq!(session.count::<Wallet>().unwrap(), 1);
    }

    #[test]
    fn test_sqlite_foreign_keys() {
        let mut session = session();
        let result = Wallet::for_user("w1", "missing", 1.0).save(&mut session);
        assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));

        let relaxed = Arc::new(SqliteStorage::open(":memory:", false).unwrap());
        init_schema(relaxed.as_ref()).unwrap();
        let mut session = Session::new(relaxed);
        Wallet::for_user("w1", "missing", 1.0).save(&mut session).unwrap();
    }

    #[test]
    fn test_sqlite_scenario() {
        let mut session = session();
        assert!(User::new("u1", "Ada", "Obi", "a@x.com").save(&mut session).is_ok());
        assert!(Wallet::for_user("w1", "u1", 100.0).save(&mut session).is_ok());

        let mut txn = Transaction::new("t1", "Transfer", "debit");
        txn.user_id = Some("u1".to_string());
        txn.user_wallet_id = Some("w1".to_string());
        txn.cost_of_transaction = 10.0;
        assert!(txn.save(&mut session).is_ok());

        let found = session.find::<Transaction>("t1").unwrap().unwrap();
        assert_eq!(found.cost_of_transaction, 10.0);
        assert_eq!(found.user_wallet_id.as_deref(), Some("w1"));
    }

    static PROFILE: TableSchema = TableSchema {
        name: "Profile",
        columns: &[
            ColumnDef::new("id", ColumnType::String(None)).primary_key(),
            ColumnDef::new("settings", ColumnType::Json),
        ],
    };

    #[test]
    fn test_sqlite_json_column_stored_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        let storage = SqliteStorage::new(path).unwrap();
        storage.create_table(&PROFILE).unwrap();

        let settings = json!({"limits": {"daily": 5000.0, "currencies": ["NGN", "USD"]}, "beta": true});
        let row = Row::new().with("id", "p1").with("settings", settings.clone());
        storage.insert(&PROFILE, &row).unwrap();
        storage.insert(&PROFILE, &Row::new().with("id", "p2")).unwrap();

        let back = storage.find(&PROFILE, "p1").unwrap().unwrap();
        assert_eq!(back.opt_json("settings").unwrap(), Some(settings));
        let empty = storage.find(&PROFILE, "p2").unwrap().unwrap();
        assert_eq!(empty.opt_json("settings").unwrap(), None);

        let raw = Connection::open(path).unwrap();
        let (kind, text): (String, String) = raw
            .query_row("SELECT typeof(settings), settings FROM Profile WHERE id = 'p1'", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(kind, "text");
        assert!(text.contains("\"currencies\""));
    }

    #[test]
    fn test_sqlite_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        {
            let storage = Arc::new(SqliteStorage::new(path).unwrap());
            init_schema(storage.as_ref()).unwrap();
            let mut session = Session::new(storage);
            Wallet::new("w1").save(&mut session).unwrap();
        }

        let storage = Arc::new(SqliteStorage::new(path).unwrap());
        init_schema(storage.as_ref()).unwrap();
        let session = Session::new(storage);
        let wallet = session.find::<Wallet>("w1").unwrap().unwrap();
        assert_eq!(wallet.wallet_amount, 0.0);
        assert!(wallet.created_at.is_some());
        assert_eq!(Wallet::schema().name, "Wallet");
    }

    #[test]
    fn test_sqlite_transaction_bookkeeping() {
        let storage = SqliteStorage::new(":memory:").unwrap();
        let tx_id = storage.begin_transaction().unwrap();
        assert!(matches!(storage.begin_transaction(), Err(StorageError::TransactionInProgress)));
        assert!(matches!(storage.commit_transaction(tx_id + 1), Err(StorageError::NoActiveTransaction)));
        storage.commit_transaction(tx_id).unwrap();
    }

    #[test]
    fn test_sqlite_fresh_user_cannot_take_existing_id() {
        let mut session = session();
        let mut ada = User::new("u1", "Ada", "Obi", "a@x.com");
        ada.save(&mut session).unwrap();

        let result = User::new("u1", "Eve", "Mallory", "e@x.com").save(&mut session);
        match result {
            Err(StorageError::ConstraintViolation(msg)) => assert!(msg.contains("User.id"), "{}", msg),
            other => panic!("expected constraint violation, got {:?}", other),
        }
        assert_eq!(session.find::<User>("u1").unwrap().unwrap(), ada);
    }

    #[test]
    fn test_sqlite_update_keeps_creation_time() {
        let mut session = session();
        let mut wallet = Wallet::new("w1");
        wallet.save(&mut session).unwrap();
        let created = wallet.created_at;

        let mut loaded = session.find::<Wallet>("w1").unwrap().unwrap();
        loaded.wallet_amount = 250.0;
        loaded.save(&mut session).unwrap();

        let stored = session.find::<Wallet>("w1").unwrap().unwrap();
        assert_eq!(stored.wallet_amount, 250.0);
        assert_eq!(stored.created_at, created);
        assert!(stored.modified_at >= wallet.modified_at);
    }

    #[test]
    fn test_sqlite_concurrent_sessions_all_commit() {
        let storage = Arc::new(SqliteStorage::new(":memory:").unwrap());
        init_schema(storage.as_ref()).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    let mut session = Session::new(storage);
                    for i in 0..50 {
                        Wallet::new(format!("w{}-{}", worker, i)).save(&mut session).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let session = Session::new(storage);
        assert_eq!(session.count::<Wallet>().unwrap(), 200);
    }
}
