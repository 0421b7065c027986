use std::fmt::Display;

use time::OffsetDateTime;

use crate::{
    models::{user::User, wallet::Wallet, Entity, Row},
    schema::{TableSchema, TRANSACTION},
    session::Session,
    storage::StorageError,
};

/// A ledger entry. Treated as immutable once written, though nothing here
/// prevents an update.
///
/// The amounts are not checked against any wallet balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub transaction_detail: String,
    pub type_of_operation: String,
    pub cost_of_transaction: f64,
    pub amount_before_transaction: f64,
    pub amount_after_transaction: f64,
    pub paystack_deduction: f64,
    /// Recipient.
    pub user_id: Option<String>,
    /// Originator.
    pub sender_id: Option<String>,
    pub user_wallet_id: Option<String>,
    pub sender_wallet_id: Option<String>,
    pub transaction_date: Option<OffsetDateTime>,
    pub modified_at: Option<OffsetDateTime>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, transaction_detail: impl Into<String>, type_of_operation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            transaction_detail: transaction_detail.into(),
            type_of_operation: type_of_operation.into(),
            cost_of_transaction: 0.0,
            amount_before_transaction: 0.0,
            amount_after_transaction: 0.0,
            paystack_deduction: 0.0,
            user_id: None,
            sender_id: None,
            user_wallet_id: None,
            sender_wallet_id: None,
            transaction_date: None,
            modified_at: None,
        }
    }

    pub fn user(&self, session: &Session) -> Result<Option<User>, StorageError> {
        match &self.user_id {
            Some(id) => session.find(id),
            None => Ok(None),
        }
    }

    pub fn sender(&self, session: &Session) -> Result<Option<User>, StorageError> {
        match &self.sender_id {
            Some(id) => session.find(id),
            None => Ok(None),
        }
    }

    pub fn wallet(&self, session: &Session) -> Result<Option<Wallet>, StorageError> {
        match &self.user_wallet_id {
            Some(id) => session.find(id),
            None => Ok(None),
        }
    }

    pub fn sender_wallet(&self, session: &Session) -> Result<Option<Wallet>, StorageError> {
        match &self.sender_wallet_id {
            Some(id) => session.find(id),
            None => Ok(None),
        }
    }
}

impl Entity for Transaction {
    fn schema() -> &'static TableSchema {
        &TRANSACTION
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id.as_str())
            .with("transaction_detail", self.transaction_detail.as_str())
            .with("type_of_operation", self.type_of_operation.as_str())
            .with("cost_of_transaction", self.cost_of_transaction)
            .with("amount_before_transaction", self.amount_before_transaction)
            .with("amount_after_transaction", self.amount_after_transaction)
            .with("paystack_deduction", self.paystack_deduction)
            .with("user_id", self.user_id.clone())
            .with("sender_id", self.sender_id.clone())
            .with("user_wallet_id", self.user_wallet_id.clone())
            .with("sender_wallet_id", self.sender_wallet_id.clone())
            .with("transaction_date", self.transaction_date)
            .with("modified_at", self.modified_at)
    }

    fn from_row(row: &Row) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.string("id")?,
            transaction_detail: row.string("transaction_detail")?,
            type_of_operation: row.string("type_of_operation")?,
            cost_of_transaction: row.opt_float("cost_of_transaction")?.unwrap_or(0.0),
            amount_before_transaction: row.opt_float("amount_before_transaction")?.unwrap_or(0.0),
            amount_after_transaction: row.opt_float("amount_after_transaction")?.unwrap_or(0.0),
            paystack_deduction: row.opt_float("paystack_deduction")?.unwrap_or(0.0),
            user_id: row.opt_string("user_id")?,
            sender_id: row.opt_string("sender_id")?,
            user_wallet_id: row.opt_string("user_wallet_id")?,
            sender_wallet_id: row.opt_string("sender_wallet_id")?,
            transaction_date: row.opt_timestamp("transaction_date")?,
            modified_at: row.opt_timestamp("modified_at")?,
        })
    }

    fn created_at(&self) -> Option<OffsetDateTime> {
        self.transaction_date
    }

    fn stamp(&mut self, now: OffsetDateTime) {
        self.transaction_date.get_or_insert(now);
        self.modified_at = Some(now);
    }
}

impl Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.user_id {
            Some(user_id) => write!(f, "<Transaction '{}' '{}'>", user_id, self.transaction_detail),
            None => write!(f, "<Transaction None '{}'>", self.transaction_detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_has_zero_amounts() {
        let txn = Transaction::new("t1", "Top up", "credit");
        assert_eq!(txn.cost_of_transaction, 0.0);
        assert_eq!(txn.paystack_deduction, 0.0);
        assert_eq!(txn.to_string(), "<Transaction None 'Top up'>");
    }

    #[test]
    fn test_stamp_sets_transaction_date_once() {
        let mut txn = Transaction::new("t1", "Top up", "credit");
        let first = OffsetDateTime::UNIX_EPOCH;
        txn.stamp(first);
        txn.stamp(first + time::Duration::minutes(5));
        assert_eq!(txn.transaction_date, Some(first));
        assert_eq!(txn.modified_at, Some(first + time::Duration::minutes(5)));
    }
}
