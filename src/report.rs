use prettytable::{row, Table};
use walletdb_core::{schema::ALL_TABLES, Entity, StorageBackend, StorageError};

/// Row count per ledger table.
pub fn stats_table(backend: &dyn StorageBackend) -> Result<Table, StorageError> {
    let mut table = Table::new();
    table.add_row(row!["Table", "Rows"]);
    for schema in ALL_TABLES {
        table.add_row(row![schema.name, backend.count(schema)?]);
    }
    Ok(table)
}

/// One record as column/value pairs, in schema order.
pub fn record_table<T: Entity>(entity: &T) -> Table {
    let record = entity.to_row();
    let mut table = Table::new();
    table.add_row(row!["Column", "Value"]);
    for column in T::schema().columns {
        table.add_row(row![column.name, record.get(column.name)]);
    }
    table
}
