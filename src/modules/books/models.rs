use std::fmt;
use std::str::FromStr;

use garde::Validate;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Identifier of a stored book: a 12-byte object id, rendered as 24 hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BookId(ObjectId);

impl BookId {
    /// Fresh, process-unique identifier.
    pub fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn as_object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for BookId {
    fn from(id: ObjectId) -> Self {
        Self(id)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_hex())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid book id '{0}': expected a 24-character hex string")]
pub struct InvalidBookId(pub String);

impl FromStr for BookId {
    type Err = InvalidBookId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s)
            .map(Self)
            .map_err(|_| InvalidBookId(s.to_string()))
    }
}

impl TryFrom<String> for BookId {
    type Error = InvalidBookId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BookId> for String {
    fn from(id: BookId) -> Self {
        id.to_string()
    }
}

/// A book as returned to clients.
///
/// Text fields and `created_at` are optional because an update against an
/// unknown id may have upserted a sparse record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Create payload. Every text field must be present; an empty string counts as present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateBook {
    #[garde(required)]
    pub author: Option<String>,
    #[garde(required)]
    pub title: Option<String>,
    #[garde(required)]
    pub description: Option<String>,
}

/// Sparse update payload: `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBook {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl UpdateBook {
    pub fn get(&self, field: BookField) -> Option<&String> {
        match field {
            BookField::Author => self.author.as_ref(),
            BookField::Title => self.title.as_ref(),
            BookField::Description => self.description.as_ref(),
        }
    }
}

/// Client-writable text fields, in merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookField {
    Author,
    Title,
    Description,
}

impl BookField {
    pub const ALL: [BookField; 3] = [BookField::Author, BookField::Title, BookField::Description];

    /// Stored field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookField::Author => "author",
            BookField::Title => "title",
            BookField::Description => "description",
        }
    }
}

/// A validated book ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Ordered set of fields to overwrite in a single merge-update.
#[derive(Debug, Clone, PartialEq)]
pub struct BookUpdate {
    pub fields: Vec<(BookField, String)>,
    pub updated_at: OffsetDateTime,
}

/// Body of `POST /books/create`.
///
/// The key is `inserted_id`. Older deployments answered with the driver's raw
/// insert result, keyed `InsertedID`; clients written against those need updating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertedBook {
    pub inserted_id: BookId,
}

/// Body of successful update and delete responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Current UTC time truncated to the millisecond precision the store keeps.
pub fn now() -> OffsetDateTime {
    truncate_to_millis(OffsetDateTime::now_utc())
}

pub fn truncate_to_millis(ts: OffsetDateTime) -> OffsetDateTime {
    let nanos = ts.unix_timestamp_nanos();
    OffsetDateTime::from_unix_timestamp_nanos(nanos - nanos.rem_euclid(1_000_000)).unwrap_or(ts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn book_id_round_trips_through_hex() {
        let id = BookId::generate();
        let parsed: BookId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.to_string().len(), 24);
    }

    #[test]
    fn malformed_book_id_is_rejected() {
        for raw in ["", "not-an-id", "64b7f0c2e1d3a4b5c6d7e8f", "zzzzzzzzzzzzzzzzzzzzzzzz"] {
            let err = raw.parse::<BookId>().unwrap_err();
            assert_eq!(err, InvalidBookId(raw.to_string()));
        }
    }

    #[test]
    fn book_id_serializes_as_plain_string() {
        let id: BookId = "64b7f0c2e1d3a4b5c6d7e8f9".parse().unwrap();
        let json = serde_json::to_value(InsertedBook { inserted_id: id }).unwrap();
        assert_eq!(json, serde_json::json!({ "inserted_id": "64b7f0c2e1d3a4b5c6d7e8f9" }));
    }

    #[test]
    fn create_payload_requires_every_field() {
        let complete = CreateBook {
            author: Some("Ursula K. Le Guin".into()),
            title: Some("The Dispossessed".into()),
            description: Some(String::new()),
        };
        assert!(complete.validate().is_ok());

        let partial = CreateBook {
            title: Some("The Dispossessed".into()),
            ..CreateBook::default()
        };
        let report = partial.validate().unwrap_err();
        let failed: Vec<String> = report.iter().map(|(path, _)| path.to_string()).collect();
        assert_eq!(failed.len(), 2);
        assert!(failed.iter().any(|f| f == "author"));
        assert!(failed.iter().any(|f| f == "description"));
    }

    #[test]
    fn update_payload_distinguishes_absent_from_empty() {
        let patch: UpdateBook = serde_json::from_str(r#"{"title": ""}"#).unwrap();
        assert_eq!(patch.get(BookField::Title), Some(&String::new()));
        assert_eq!(patch.get(BookField::Author), None);
        assert_eq!(patch.get(BookField::Description), None);
    }

    #[test]
    fn book_serializes_rfc3339_timestamps() {
        let book = Book {
            id: "64b7f0c2e1d3a4b5c6d7e8f9".parse().unwrap(),
            author: Some("A".into()),
            title: None,
            description: None,
            created_at: None,
            updated_at: Some(datetime!(2024-03-01 12:30:00.125 UTC)),
        };
        let json = serde_json::to_value(&book).unwrap();
        let updated_at = json["updated_at"].as_str().unwrap();
        assert!(updated_at.starts_with("2024-03-01T12:30:00.125"));
        assert!(updated_at.ends_with('Z'));
        assert!(json["created_at"].is_null());
        assert!(json["title"].is_null());
    }

    #[test]
    fn timestamps_are_truncated_to_millis() {
        let ts = datetime!(2024-03-01 12:30:00.123456789 UTC);
        assert_eq!(truncate_to_millis(ts), datetime!(2024-03-01 12:30:00.123 UTC));
        assert_eq!(now().nanosecond() % 1_000_000, 0);
    }
}
