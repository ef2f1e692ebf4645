//! Book operations: validation, the update-merge engine, and storage calls.
//!
//! Each operation is one storage call. Nothing is read before an update, so
//! the store's single merge-update is the only write that happens.

use std::sync::Arc;

use garde::Validate;
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{self, Book, BookField, BookId, BookUpdate, CreateBook, NewBook, UpdateBook};
use super::store::{BookStore, StorageError, UpdateOutcome};

/// Client-facing message for a failed or missed lookup.
pub const FETCH_FAILED: &str = "Error occurred while fetching book.";

#[derive(Debug, Error)]
pub enum BookError {
    #[error("{message}")]
    Validation { fields: Vec<String>, message: String },

    #[error("book {0} not found")]
    NotFound(BookId),

    #[error("Book item was not created.")]
    InsertFailed(#[source] StorageError),

    #[error("{}", FETCH_FAILED)]
    FetchFailed(#[source] StorageError),

    #[error("Book item update failed.")]
    UpdateFailed(#[source] StorageError),

    #[error("Error occurred while deleting book item.")]
    DeleteFailed(#[source] StorageError),

    #[error("Error occurred while fetching book list.")]
    ListFailed(#[source] StorageError),
}

/// Builds the merge set for a partial update.
///
/// Supplied fields are taken in `author`, `title`, `description` order and
/// `updated_at` is always refreshed, even when no text field was supplied.
pub fn build_update(patch: &UpdateBook, now: OffsetDateTime) -> BookUpdate {
    let fields = BookField::ALL
        .into_iter()
        .filter_map(|field| patch.get(field).map(|value| (field, value.clone())))
        .collect();

    BookUpdate {
        fields,
        updated_at: now,
    }
}

/// Checks the create payload and stamps both timestamps with the same instant.
pub fn prepare_new_book(input: CreateBook, now: OffsetDateTime) -> Result<NewBook, BookError> {
    if let Err(report) = input.validate() {
        let fields: Vec<String> = report.iter().map(|(path, _)| path.to_string()).collect();
        let message = format!("missing required field(s): {}", fields.join(", "));
        return Err(BookError::Validation { fields, message });
    }

    Ok(NewBook {
        author: input.author,
        title: input.title,
        description: input.description,
        created_at: now,
        updated_at: now,
    })
}

#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn BookStore>,
    upsert_on_update: bool,
}

impl BookService {
    pub fn new(store: Arc<dyn BookStore>, upsert_on_update: bool) -> Self {
        Self {
            store,
            upsert_on_update,
        }
    }

    pub fn upsert_on_update(&self) -> bool {
        self.upsert_on_update
    }

    pub async fn create(&self, input: CreateBook) -> Result<BookId, BookError> {
        let book = prepare_new_book(input, models::now())?;
        self.store.insert(book).await.map_err(BookError::InsertFailed)
    }

    pub async fn get(&self, id: &BookId) -> Result<Book, BookError> {
        self.store
            .find_by_id(id)
            .await
            .map_err(BookError::FetchFailed)?
            .ok_or(BookError::NotFound(*id))
    }

    /// Applies only the supplied fields. A miss either upserts a sparse record
    /// or fails with `NotFound`, depending on the configured policy.
    pub async fn update(&self, id: &BookId, patch: &UpdateBook) -> Result<UpdateOutcome, BookError> {
        let update = build_update(patch, models::now());
        let outcome = self
            .store
            .merge_update(id, &update, self.upsert_on_update)
            .await
            .map_err(BookError::UpdateFailed)?;

        if !outcome.matched && !outcome.upserted {
            return Err(BookError::NotFound(*id));
        }

        if outcome.upserted {
            tracing::warn!(book_id = %id, "update matched no book; inserted a sparse record");
        }

        Ok(outcome)
    }

    /// Deleting an unknown id is not an error; the count is returned for logging.
    pub async fn delete(&self, id: &BookId) -> Result<u64, BookError> {
        self.store
            .delete_by_id(id)
            .await
            .map_err(BookError::DeleteFailed)
    }

    pub async fn list(&self) -> Result<Vec<Book>, BookError> {
        self.store.find_all().await.map_err(BookError::ListFailed)
    }
}
