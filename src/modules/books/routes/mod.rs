//! HTTP handlers for the books module, mounted under `/books`.

use anyhow::anyhow;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bookshelf_http::AppError;

use super::models::{
    Book, BookId, CreateBook, InsertedBook, InvalidBookId, StatusMessage, UpdateBook,
};
use super::service::{BookError, BookService, FETCH_FAILED};

pub fn router(service: BookService) -> Router {
    Router::new()
        .route("/", get(list_books))
        .route("/create", post(create_book))
        .route(
            "/{book_id}",
            get(get_book).patch(update_book).delete(delete_book),
        )
        .with_state(service)
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation { fields, message } => AppError::validation(fields, message),
            BookError::NotFound(id) => AppError::not_found(format!("book {} not found", id)),
            storage => AppError::Internal(anyhow::Error::new(storage)),
        }
    }
}

fn parse_id(path: Result<Path<String>, PathRejection>) -> Result<BookId, AppError> {
    let Path(raw) = path?;
    raw.parse()
        .map_err(|e: InvalidBookId| AppError::bad_request(e.to_string()))
}

async fn create_book(
    State(service): State<BookService>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<InsertedBook>), AppError> {
    let Json(input) = payload?;
    let id = service.create(input).await?;

    tracing::info!(book_id = %id, "book created");
    Ok((StatusCode::CREATED, Json(InsertedBook { inserted_id: id })))
}

async fn get_book(
    State(service): State<BookService>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Book>, AppError> {
    let id = parse_id(path)?;

    match service.get(&id).await {
        Ok(book) => Ok(Json(book)),
        // A lookup miss is reported exactly like a failed lookup.
        Err(BookError::NotFound(id)) => Err(AppError::Internal(
            anyhow!("no book with id {}", id).context(FETCH_FAILED),
        )),
        Err(err) => Err(err.into()),
    }
}

async fn update_book(
    State(service): State<BookService>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> Result<Json<StatusMessage>, AppError> {
    let id = parse_id(path)?;
    let Json(patch) = payload?;

    let outcome = service.update(&id, &patch).await?;

    tracing::info!(book_id = %id, upserted = outcome.upserted, "book updated");
    Ok(Json(StatusMessage::new("Book item updated successfully.")))
}

async fn delete_book(
    State(service): State<BookService>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<StatusMessage>, AppError> {
    let id = parse_id(path)?;
    let deleted = service.delete(&id).await?;

    tracing::info!(book_id = %id, deleted, "book deleted");
    Ok(Json(StatusMessage::new("Book item deleted successfully.")))
}

async fn list_books(State(service): State<BookService>) -> Result<Json<Vec<Book>>, AppError> {
    let books = service.list().await?;
    Ok(Json(books))
}
