use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use walletdb::storage::{SqliteStorage, StorageBackend};
use walletdb_core::{init_schema, new_id, Persistable, Session, Transaction, User, Wallet};

fn setup() -> Session {
    let storage: Arc<dyn StorageBackend> = Arc::new(SqliteStorage::new(":memory:").unwrap());
    init_schema(storage.as_ref()).unwrap();
    Session::new(storage)
}

fn seed_data(session: &mut Session) {
    User::new("u1", "Ada", "Obi", "a@x.com").save(session).unwrap();
    Wallet::for_user("w1", "u1", 100_000.0).save(session).unwrap();

    for i in 0..100 {
        let mut txn = Transaction::new(format!("t{}", i), format!("Transfer {}", i), "debit");
        txn.user_id = Some("u1".to_string());
        txn.user_wallet_id = Some("w1".to_string());
        txn.cost_of_transaction = 10.0;
        txn.save(session).unwrap();
    }
}

fn bench_save_transaction(c: &mut Criterion) {
    let mut session = setup();
    seed_data(&mut session);

    c.bench_function("save_transaction", |b| {
        b.iter(|| {
            let mut txn = Transaction::new(new_id(), "Airtime", "debit");
            txn.user_id = Some("u1".to_string());
            txn.cost_of_transaction = 1.5;
            txn.save(black_box(&mut session)).unwrap()
        })
    });
}

fn bench_find_by_id(c: &mut Criterion) {
    let mut session = setup();
    seed_data(&mut session);

    c.bench_function("find_transaction_by_id", |b| {
        b.iter(|| session.find::<Transaction>(black_box("t42")).unwrap())
    });
}

fn bench_user_history(c: &mut Criterion) {
    let mut session = setup();
    seed_data(&mut session);
    let user = session.find::<User>("u1").unwrap().unwrap();

    c.bench_function("user_transaction_history", |b| {
        b.iter(|| user.transactions(black_box(&session)).unwrap())
    });
}

criterion_group!(benches, bench_save_transaction, bench_find_by_id, bench_user_history);
criterion_main!(benches);
