//! Table declarations for the ledger entities.
//!
//! These statics are the only place column names, types, nullability,
//! uniqueness, defaults and foreign keys are written down. Backends render
//! their DDL and DML from them (see [`crate::sql`]).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Optional maximum length.
    String(Option<u32>),
    Float,
    Boolean,
    Timestamp,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub nullable: bool,
    pub unique: bool,
    /// SQL literal shared by both dialects.
    pub default: Option<&'static str>,
    pub references: Option<ForeignKey>,
    /// Written on insert only; updates leave the stored value alone.
    pub write_once: bool,
}

impl ColumnDef {
    pub const fn new(name: &'static str, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            primary_key: false,
            nullable: true,
            unique: false,
            default: None,
            references: None,
            write_once: false,
        }
    }

    pub const fn primary_key(self) -> Self {
        Self { primary_key: true, nullable: false, ..self }
    }

    pub const fn not_null(self) -> Self {
        Self { nullable: false, ..self }
    }

    pub const fn unique(self) -> Self {
        Self { unique: true, ..self }
    }

    pub const fn default(self, literal: &'static str) -> Self {
        Self { default: Some(literal), ..self }
    }

    pub const fn references(self, table: &'static str) -> Self {
        Self { references: Some(ForeignKey { table, column: "id" }), ..self }
    }

    pub const fn write_once(self) -> Self {
        Self { write_once: true, ..self }
    }
}

#[derive(Debug, PartialEq)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> &ColumnDef {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .unwrap_or(&self.columns[0])
    }

    /// Columns an update may change, in declaration order.
    pub fn updatable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.primary_key && !c.write_once)
    }
}

const ID: ColumnDef = ColumnDef::new("id", ColumnType::String(None)).primary_key();
const CREATED_AT: ColumnDef = ColumnDef::new("created_at", ColumnType::Timestamp).write_once();
const MODIFIED_AT: ColumnDef = ColumnDef::new("modified_at", ColumnType::Timestamp);

const fn money(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::Float).default("0.0")
}

const fn user_ref(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::String(None)).references("User")
}

const fn wallet_ref(name: &'static str) -> ColumnDef {
    ColumnDef::new(name, ColumnType::String(None)).references("Wallet")
}

pub static USER: TableSchema = TableSchema {
    name: "User",
    columns: &[
        ID,
        ColumnDef::new("firstname", ColumnType::String(Some(30))).not_null(),
        ColumnDef::new("lastname", ColumnType::String(Some(30))).not_null(),
        ColumnDef::new("email", ColumnType::String(Some(50))).not_null().unique(),
        ColumnDef::new("image_url", ColumnType::String(None)),
        ColumnDef::new("authorization_code", ColumnType::String(None)).unique(),
        ColumnDef::new("authorization_code_status", ColumnType::Boolean).default("FALSE"),
        CREATED_AT,
        MODIFIED_AT,
    ],
};

pub static WALLET: TableSchema = TableSchema {
    name: "Wallet",
    columns: &[
        ID,
        money("wallet_amount"),
        user_ref("user_id"),
        CREATED_AT,
        MODIFIED_AT,
    ],
};

pub static TRANSACTION: TableSchema = TableSchema {
    name: "Transaction",
    columns: &[
        ID,
        ColumnDef::new("transaction_detail", ColumnType::String(None)).not_null(),
        ColumnDef::new("type_of_operation", ColumnType::String(None)).not_null(),
        money("cost_of_transaction"),
        money("amount_before_transaction"),
        money("amount_after_transaction"),
        money("paystack_deduction"),
        user_ref("user_id"),
        user_ref("sender_id"),
        wallet_ref("user_wallet_id"),
        wallet_ref("sender_wallet_id"),
        ColumnDef::new("transaction_date", ColumnType::Timestamp).write_once(),
        MODIFIED_AT,
    ],
};

pub static NOTIFICATION: TableSchema = TableSchema {
    name: "Notification",
    columns: &[
        ID,
        ColumnDef::new("message", ColumnType::String(None)),
        user_ref("recipient_id"),
        user_ref("sender_id"),
        CREATED_AT,
        MODIFIED_AT,
    ],
};

/// Creation order; referenced tables come first.
pub static ALL_TABLES: [&TableSchema; 4] = [&USER, &WALLET, &TRANSACTION, &NOTIFICATION];
