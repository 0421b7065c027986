use std::fmt::Display;

use time::OffsetDateTime;

use crate::{
    models::{user::User, Entity, Row},
    schema::{TableSchema, NOTIFICATION},
    session::Session,
    storage::StorageError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub message: Option<String>,
    pub recipient_id: Option<String>,
    pub sender_id: Option<String>,
    pub created_at: Option<OffsetDateTime>,
    pub modified_at: Option<OffsetDateTime>,
}

impl Notification {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: Some(message.into()),
            recipient_id: None,
            sender_id: None,
            created_at: None,
            modified_at: None,
        }
    }

    /// The recipient.
    pub fn user(&self, session: &Session) -> Result<Option<User>, StorageError> {
        match &self.recipient_id {
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
}

impl Entity for Notification {
    fn schema() -> &'static TableSchema {
        &NOTIFICATION
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("id", self.id.as_str())
            .with("message", self.message.clone())
            .with("recipient_id", self.recipient_id.clone())
            .with("sender_id", self.sender_id.clone())
            .with("created_at", self.created_at)
            .with("modified_at", self.modified_at)
    }

    fn from_row(row: &Row) -> Result<Self, StorageError> {
        Ok(Self {
            id: row.string("id")?,
            message: row.opt_string("message")?,
            recipient_id: row.opt_string("recipient_id")?,
            sender_id: row.opt_string("sender_id")?,
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

impl Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "<Notification '{}'>", message),
            None => f.write_str("<Notification None>"),
        }
    }
}
