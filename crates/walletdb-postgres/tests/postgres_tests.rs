//! Needs a live server: set `WALLETDB_TEST_POSTGRES_URL` and run with
//! `cargo test -p walletdb-postgres -- --ignored`.

use std::sync::Arc;

use postgres::{Client, NoTls};
use serde_json::json;
use walletdb_core::{
    init_schema, new_id, ColumnDef, ColumnType, Persistable, Row, Session, StorageBackend, StorageError,
    TableSchema, Transaction, User, Wallet,
};
use walletdb_postgres::PostgresStorage;

fn url() -> String {
    std::env::var("WALLETDB_TEST_POSTGRES_URL").expect("WALLETDB_TEST_POSTGRES_URL not set")
}

fn session() -> Session {
    let storage = Arc::new(PostgresStorage::new(&url()).unwrap());
    init_schema(storage.as_ref()).unwrap();
    Session::new(storage)
}

/// Unique per test run so tests can share one database.
fn email() -> String {
    format!("{}@example.com", new_id())
}

#[test]
#[ignore]
fn test_pg_user_round_trip() {
    let mut session = session();
    let id = new_id();
    let mut user = User::new(id.as_str(), "Ada", "Obi", email());
    user.image_url = Some("https://img/ada.png".to_string());
    user.save(&mut session).unwrap();

    let found = session.find::<User>(&id).unwrap().unwrap();
    assert_eq!(found.email, user.email);
    assert_eq!(found.image_url, user.image_url);
    assert!(!found.authorization_code_status);
    // Microsecond column precision.
    let created = found.created_at.unwrap();
    let expected = user.created_at.unwrap();
    assert!((created - expected).abs() < time::Duration::milliseconds(1));
}

#[test]
#[ignore]
fn test_pg_duplicate_email_rolls_back_whole_unit() {
    let mut session = session();
    let shared = email();
    User::new(new_id(), "Ada", "Obi", shared.as_str()).save(&mut session).unwrap();

    let wallet_id = new_id();
    let wallet = Wallet::new(wallet_id.as_str());
    session.add(&wallet);
    let result = User::new(new_id(), "Bo", "Eze", shared.as_str()).save(&mut session);

    assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
    assert!(session.find::<Wallet>(&wallet_id).unwrap().is_none());
    assert_eq!(session.pending(), 0);
}

#[test]
#[ignore]
fn test_pg_scenario_and_relationships() {
    let mut session = session();
    let user_id = new_id();
    let wallet_id = new_id();
    User::new(user_id.as_str(), "Ada", "Obi", email()).save(&mut session).unwrap();
    Wallet::for_user(wallet_id.as_str(), user_id.as_str(), 100.0).save(&mut session).unwrap();

    let mut txn = Transaction::new(new_id(), "Transfer", "debit");
    txn.user_id = Some(user_id.clone());
    txn.user_wallet_id = Some(wallet_id.clone());
    txn.cost_of_transaction = 10.0;
    txn.save(&mut session).unwrap();

    let user = session.find::<User>(&user_id).unwrap().unwrap();
    assert_eq!(user.wallets(&session).unwrap().len(), 1);
    let history = user.transactions(&session).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].cost_of_transaction, 10.0);

    txn.delete(&mut session).unwrap();
    assert!(user.transactions(&session).unwrap().is_empty());
}

#[test]
#[ignore]
fn test_pg_fresh_user_cannot_take_existing_id() {
    let mut session = session();
    let id = new_id();
    let mut ada = User::new(id.as_str(), "Ada", "Obi", email());
    ada.save(&mut session).unwrap();

    let result = User::new(id.as_str(), "Eve", "Mallory", email()).save(&mut session);
    assert!(matches!(result, Err(StorageError::ConstraintViolation(_))));
    assert_eq!(session.find::<User>(&id).unwrap().unwrap().firstname, "Ada");
}

#[test]
#[ignore]
fn test_pg_concurrent_sessions_all_commit() {
    let storage = Arc::new(PostgresStorage::new(&url()).unwrap());
    init_schema(storage.as_ref()).unwrap();
    let prefix = new_id();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let storage = storage.clone();
            let prefix = prefix.clone();
            std::thread::spawn(move || {
                let mut session = Session::new(storage);
                for i in 0..25 {
                    Wallet::new(format!("{}-{}-{}", prefix, worker, i)).save(&mut session).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let session = Session::new(storage);
    assert!(session.find::<Wallet>(&format!("{}-3-24", prefix)).unwrap().is_some());
    assert!(session.find::<Wallet>(&format!("{}-0-0", prefix)).unwrap().is_some());
}

#[test]
#[ignore]
fn test_pg_delete_missing_row() {
    let mut session = session();
    let result = Wallet::new(new_id()).delete(&mut session);
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

static PROFILE: TableSchema = TableSchema {
    name: "Profile",
    columns: &[
        ColumnDef::new("id", ColumnType::String(None)).primary_key(),
        ColumnDef::new("settings", ColumnType::Json),
    ],
};

#[test]
#[ignore]
fn test_pg_json_column_is_native() {
    let storage = PostgresStorage::new(&url()).unwrap();
    storage.create_table(&PROFILE).unwrap();

    let id = new_id();
    let settings = json!({"limits": {"daily": 5000.0}, "channels": ["sms", "email"]});
    storage
        .insert(&PROFILE, &Row::new().with("id", id.as_str()).with("settings", settings.clone()))
        .unwrap();
    let back = storage.find(&PROFILE, &id).unwrap().unwrap();
    assert_eq!(back.opt_json("settings").unwrap(), Some(settings));

    let mut raw = Client::connect(&url(), NoTls).unwrap();
    let row = raw
        .query_one("SELECT pg_typeof(settings)::text FROM \"Profile\" WHERE id = $1", &[&id])
        .unwrap();
    let kind: String = row.get(0);
    assert_eq!(kind, "json");
}
