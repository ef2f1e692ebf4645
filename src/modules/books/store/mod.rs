//! Persistence seam for the books collection.
//!
//! [`BookStore`] is the only way the service touches storage. Both backends
//! share [`BookDocument`] as their record shape, so merge and upsert behave
//! identically whether the data lives in MongoDB or in process memory.

mod memory;
mod mongo;

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{Book, BookField, BookId, BookUpdate, NewBook};

pub use memory::InMemoryBookStore;
pub use mongo::MongoBookStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("storage backend failure: {0}")]
    Backend(String),

    #[error("stored document could not be decoded: {0}")]
    Decode(String),
}

/// Result of a merge-update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// An existing document had the id.
    pub matched: bool,
    /// No document matched and a sparse one was inserted.
    pub upserted: bool,
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Insert a book and return its freshly assigned id.
    async fn insert(&self, book: NewBook) -> Result<BookId, StorageError>;

    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StorageError>;

    /// Overwrite exactly the fields in `update` on the document with `id`.
    /// With `upsert`, a miss inserts a document holding only those fields.
    async fn merge_update(
        &self,
        id: &BookId,
        update: &BookUpdate,
        upsert: bool,
    ) -> Result<UpdateOutcome, StorageError>;

    /// Returns the number of removed documents (0 or 1).
    async fn delete_by_id(&self, id: &BookId) -> Result<u64, StorageError>;

    /// Every book, in natural storage order.
    async fn find_all(&self) -> Result<Vec<Book>, StorageError>;
}

/// Stored record shape: `{_id, author, title, description, created_at, updated_at}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<bson::DateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<bson::DateTime>,
}

impl BookDocument {
    pub fn from_new(id: ObjectId, book: NewBook) -> Self {
        Self {
            id,
            author: book.author,
            title: book.title,
            description: book.description,
            created_at: Some(to_bson_datetime(book.created_at)),
            updated_at: Some(to_bson_datetime(book.updated_at)),
        }
    }

    /// The document an upsert creates: only the id and the updated fields.
    pub fn sparse(id: ObjectId, update: &BookUpdate) -> Self {
        let mut document = Self {
            id,
            author: None,
            title: None,
            description: None,
            created_at: None,
            updated_at: None,
        };
        document.apply(update);
        document
    }

    pub fn apply(&mut self, update: &BookUpdate) {
        for (field, value) in &update.fields {
            let slot = match field {
                BookField::Author => &mut self.author,
                BookField::Title => &mut self.title,
                BookField::Description => &mut self.description,
            };
            *slot = Some(value.clone());
        }
        self.updated_at = Some(to_bson_datetime(update.updated_at));
    }
}

impl TryFrom<BookDocument> for Book {
    type Error = StorageError;

    fn try_from(document: BookDocument) -> Result<Self, Self::Error> {
        Ok(Book {
            id: BookId::from(document.id),
            author: document.author,
            title: document.title,
            description: document.description,
            created_at: document.created_at.map(from_bson_datetime).transpose()?,
            updated_at: document.updated_at.map(from_bson_datetime).transpose()?,
        })
    }
}

pub fn to_bson_datetime(ts: OffsetDateTime) -> bson::DateTime {
    // i64 milliseconds covers the whole range `OffsetDateTime` can hold.
    bson::DateTime::from_millis((ts.unix_timestamp_nanos() / 1_000_000) as i64)
}

/// Only years 0000 through 9999 are accepted; RFC 3339 cannot render the rest.
pub fn from_bson_datetime(dt: bson::DateTime) -> Result<OffsetDateTime, StorageError> {
    let nanos = i128::from(dt.timestamp_millis()) * 1_000_000;
    let ts = OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .map_err(|e| StorageError::Decode(format!("timestamp {} out of range: {}", dt, e)))?;
    if !(0..=9999).contains(&ts.year()) {
        return Err(StorageError::Decode(format!(
            "timestamp {} has year {}, outside 0000-9999",
            dt.timestamp_millis(),
            ts.year()
        )));
    }
    Ok(ts)
}
