use crate::{dialect::Dialect, schema::TableSchema};

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_list(table: &TableSchema) -> String {
    table
        .columns
        .iter()
        .map(|c| quote_ident(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table(table: &TableSchema, dialect: Dialect) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote_ident(c.name), dialect.column_type(c.column_type));
            if c.primary_key {
                def.push_str(" PRIMARY KEY");
            }
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if c.unique {
                def.push_str(" UNIQUE");
            }
            if let Some(default) = c.default {
                def.push_str(" DEFAULT ");
                def.push_str(default);
            }
            if let Some(fk) = c.references {
                def.push_str(&format!(" REFERENCES {} ({})", quote_ident(fk.table), quote_ident(fk.column)));
            }
            def
        })
        .collect();

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(table.name),
        columns.join(",\n    ")
    )
}

/// Parameters are bound in column declaration order.
pub fn insert(table: &TableSchema, dialect: Dialect) -> String {
    let placeholders: Vec<String> = (1..=table.columns.len())
        .map(|n| dialect.placeholder(n))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table.name),
        column_list(table),
        placeholders.join(", ")
    )
}

/// Parameters are bound as [`TableSchema::updatable_columns`] followed by the
/// primary key.
pub fn update_by_id(table: &TableSchema, dialect: Dialect) -> String {
    let assignments: Vec<String> = table
        .updatable_columns()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", quote_ident(c.name), dialect.placeholder(i + 1)))
        .collect();

    format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quote_ident(table.name),
        assignments.join(", "),
        quote_ident(table.primary_key().name),
        dialect.placeholder(assignments.len() + 1)
    )
}

pub fn select_by_id(table: &TableSchema, dialect: Dialect) -> String {
    select_where(table, table.primary_key().name, dialect)
}

pub fn select_where(table: &TableSchema, column: &str, dialect: Dialect) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {}",
        column_list(table),
        quote_ident(table.name),
        quote_ident(column),
        dialect.placeholder(1),
        quote_ident(table.primary_key().name)
    )
}

pub fn delete_by_id(table: &TableSchema, dialect: Dialect) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        quote_ident(table.name),
        quote_ident(table.primary_key().name),
        dialect.placeholder(1)
    )
}

pub fn count(table: &TableSchema) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(table.name))
}
