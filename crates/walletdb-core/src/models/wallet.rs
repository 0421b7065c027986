use std::fmt::Display;

use time::OffsetDateTime;

use crate::{
    models::{transaction::Transaction, user::User, Entity, Row},
    schema::{TableSchema, WALLET},
    session::Session,
    storage::StorageError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Wallet {
    pub id: String,
    pub wallet_amount: f64,
    pub user_id: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub modified_at: Option<OffsetDateTime>,
}

impl Wallet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            wallet_amount: 0.0,
            user_id: None,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn for_user(id: impl Into<String>, user_id: impl Into<String>, wallet_amount: f64) -> Self {
        Self {
            wallet_amount,
            user_id: Some(user_id.into()),
            ..Self::new(id)
        }
    }

    pub fn user(&self, session: &Session) -> Result<Option<User>, StorageError> {
        match &self.user_id {
            Some(user_id) => session.find(user_id),
            None => Ok(None),
        }
    }

    /// Transactions credited to this wallet.
    pub fn transactions(&self, session: &Session) -> Result<Vec<Transaction>, StorageError> {
        session.find_by("user_wallet_id", &self.id)
    }
}

impl Entity for Wallet {
    fn schema() -> &'static TableSchema {
        &WALLET
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id.as_str())
            .with("wallet_amount", self.wallet_amount)
            .with("user_id", self.user_id.clone())
            .with("created_at", self.created_at)
            .with("modified_at", self.modified_at)
    }

    fn from_row(row: &Row) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.string("id")?,
            wallet_amount: row.opt_float("wallet_amount")?.unwrap_or(0.0),
            user_id: row.opt_string("user_id")?,
            created_at: row.opt_timestamp("created_at")?,
            modified_at: row.opt_timestamp("modified_at")?,
        })
    }

    fn created_at(&self) -> Option<OffsetDateTime> {
        self.created_at
    }

    fn stamp(&mut self, now: OffsetDateTime) {
        self.created_at.get_or_insert(now);
        self.modified_at = Some(now);
    }
}

impl Display for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.user_id {
            Some(user_id) => write!(f, "<Wallet '{}' {}>", user_id, self.wallet_amount),
            None => write!(f, "<Wallet None {}>", self.wallet_amount),
        }
    }
}
