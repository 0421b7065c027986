use std::fmt::Display;

use time::OffsetDateTime;

use crate::{
    models::{notification::Notification, transaction::Transaction, wallet::Wallet, Entity, Row},
    schema::{TableSchema, USER},
    session::Session,
    storage::StorageError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub image_url: Option<String>,
    /// Links the user to an external authorization record.
    pub authorization_code: Option<String>,
    pub authorization_code_status: bool,
    pub created_at: Option<OffsetDateTime>,
    pub modified_at: Option<OffsetDateTime>,
}

impl User {
    pub fn new(id: impl Into<String>, firstname: impl Into<String>, lastname: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            firstname: firstname.into(),
            lastname: lastname.into(),
            email: email.into(),
            image_url: None,
            authorization_code: None,
            authorization_code_status: false,
            created_at: None,
            modified_at: None,
        }
    }

    pub fn wallets(&self, session: &Session) -> Result<Vec<Wallet>, StorageError> {
        session.find_by("user_id", &self.id)
    }

    /// Transactions received by this user.
    pub fn transactions(&self, session: &Session) -> Result<Vec<Transaction>, StorageError> {
        session.find_by("user_id", &self.id)
    }

    pub fn sent_transactions(&self, session: &Session) -> Result<Vec<Transaction>, StorageError> {
        session.find_by("sender_id", &self.id)
    }

    /// Notifications addressed to this user.
    pub fn notifications(&self, session: &Session) -> Result<Vec<Notification>, StorageError> {
        session.find_by("recipient_id", &self.id)
    }

    pub fn sent_notifications(&self, session: &Session) -> Result<Vec<Notification>, StorageError> {
        session.find_by("sender_id", &self.id)
    }
}

impl Entity for User {
    fn schema() -> &'static TableSchema {
        &USER
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id.as_str())
            .with("firstname", self.firstname.as_str())
            .with("lastname", self.lastname.as_str())
            .with("email", self.email.as_str())
            .with("image_url", self.image_url.clone())
            .with("authorization_code", self.authorization_code.clone())
            .with("authorization_code_status", self.authorization_code_status)
            .with("created_at", self.created_at)
            .with("modified_at", self.modified_at)
    }

    fn from_row(row: &Row) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.string("id")?,
            firstname: row.string("firstname")?,
            lastname: row.string("lastname")?,
            email: row.string("email")?,
            image_url: row.opt_string("image_url")?,
            authorization_code: row.opt_string("authorization_code")?,
            authorization_code_status: row.opt_bool("authorization_code_status")?.unwrap_or(false),
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

impl Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<User '{}' '{}'>", self.firstname, self.lastname)
    }
}
