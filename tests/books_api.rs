use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use bookshelf_app::books::models::{Book, InsertedBook};
use bookshelf_kernel::settings::{Settings, StorageBackend};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app_with(configure: impl FnOnce(&mut Settings)) -> Router {
    let mut settings = Settings::default();
    settings.database.backend = StorageBackend::Memory;
    configure(&mut settings);

    let registry = bookshelf_app::build_registry(&settings).await.unwrap();
    bookshelf_http::build_router(&registry, &settings)
}

async fn app() -> Router {
    app_with(|_| {}).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(raw) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(raw.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

async fn create(app: &Router, author: &str, title: &str, description: &str) -> String {
    let payload = json!({ "author": author, "title": title, "description": description });
    let (status, body) = send(app, Method::POST, "/books/create", Some(&payload.to_string())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let inserted: InsertedBook = serde_json::from_value(body).unwrap();
    inserted.inserted_id.to_string()
}

async fn fetch(app: &Router, id: &str) -> Book {
    let (status, body) = send(app, Method::GET, &format!("/books/{id}"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_value(body).unwrap()
}

async fn list(app: &Router) -> Vec<Book> {
    let (status, body) = send(app, Method::GET, "/books", None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    serde_json::from_value(body).unwrap()
}

#[tokio::test]
async fn create_then_read_round_trip() {
    let app = app().await;
    let id = create(&app, "Ursula K. Le Guin", "The Left Hand of Darkness", "Gethen").await;
    assert_eq!(id.len(), 24);

    let book = fetch(&app, &id).await;
    assert_eq!(book.id.to_string(), id);
    assert_eq!(book.author.as_deref(), Some("Ursula K. Le Guin"));
    assert_eq!(book.title.as_deref(), Some("The Left Hand of Darkness"));
    assert_eq!(book.description.as_deref(), Some("Gethen"));
    assert!(book.created_at.is_some());
    assert_eq!(book.created_at, book.updated_at);
}

#[tokio::test]
async fn create_with_missing_field_is_rejected_and_not_persisted() {
    let app = app().await;
    for payload in [
        json!({ "title": "T", "description": "D" }),
        json!({ "author": "A", "description": "D" }),
        json!({ "author": "A", "title": "T" }),
        json!({ "author": null, "title": "T", "description": "D" }),
        json!({}),
    ] {
        let (status, body) =
            send(&app, Method::POST, "/books/create", Some(&payload.to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
        assert!(body["error"].as_str().unwrap().contains("missing required field"));
    }

    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = app().await;
    let (status, body) = send(&app, Method::POST, "/books/create", Some("{\"author\": ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let id = create(&app, "A", "T", "D").await;
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/books/{id}"),
        Some("{\"title\": 42}"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(fetch(&app, &id).await.title.as_deref(), Some("T"));
}

#[tokio::test]
async fn malformed_id_is_a_bad_request() {
    let app = app().await;
    for (method, body) in [
        (Method::GET, None),
        (Method::PATCH, Some("{\"title\": \"T\"}")),
        (Method::DELETE, None),
    ] {
        let (status, response) = send(&app, method.clone(), "/books/not-an-object-id", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method}");
        assert!(response["error"].as_str().unwrap().contains("not-an-object-id"));
    }

    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn patch_changes_only_supplied_fields() {
    let app = app().await;
    let id = create(&app, "A", "T", "D").await;
    let before = fetch(&app, &id).await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/books/{id}"),
        Some(r#"{"title": "T2"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Book item updated successfully." }));

    let after = fetch(&app, &id).await;
    assert_eq!(after.author.as_deref(), Some("A"));
    assert_eq!(after.title.as_deref(), Some("T2"));
    assert_eq!(after.description.as_deref(), Some("D"));
    assert_eq!(after.created_at, before.created_at);
    assert!(after.updated_at > before.updated_at);
}

// Documents the preserved upsert policy: PATCH on an unknown id creates a
// record with only the supplied fields.
#[tokio::test]
async fn patch_on_unknown_id_creates_sparse_record() {
    let app = app().await;
    let id = "64b7f0c2e1d3a4b5c6d7e8f9";

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/books/{id}"),
        Some(r#"{"author": "Ghost"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let book = fetch(&app, id).await;
    assert_eq!(book.author.as_deref(), Some("Ghost"));
    assert_eq!(book.title, None);
    assert_eq!(book.description, None);
    assert_eq!(book.created_at, None);
    assert!(book.updated_at.is_some());
}

#[tokio::test]
async fn patch_on_unknown_id_is_not_found_when_upsert_disabled() {
    let app = app_with(|s| s.books.upsert_on_update = false).await;
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/books/64b7f0c2e1d3a4b5c6d7e8f9",
        Some(r#"{"author": "Ghost"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));
    assert!(list(&app).await.is_empty());
}

#[tokio::test]
async fn get_unknown_id_reports_a_fetch_error() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/books/64b7f0c2e1d3a4b5c6d7e8f9", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Error occurred while fetching book." }));
}

#[tokio::test]
async fn delete_is_quiet_about_unknown_ids() {
    let app = app().await;
    let id = create(&app, "A", "T", "D").await;

    for _ in 0..2 {
        let (status, body) = send(&app, Method::DELETE, &format!("/books/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Book item deleted successfully." }));
    }
}

#[tokio::test]
async fn list_reflects_creates_updates_and_deletes() {
    let app = app().await;
    let mut ids = Vec::new();
    for n in 0..4 {
        ids.push(create(&app, "A", &format!("T{n}"), "D").await);
    }

    send(
        &app,
        Method::PATCH,
        &format!("/books/{}", ids[0]),
        Some(r#"{"description": "revised"}"#),
    )
    .await;
    let (status, _) = send(&app, Method::DELETE, &format!("/books/{}", ids[2]), None).await;
    assert_eq!(status, StatusCode::OK);

    let books = list(&app).await;
    assert_eq!(books.len(), 3);
    let listed: Vec<String> = books.iter().map(|b| b.id.to_string()).collect();
    assert_eq!(listed, vec![ids[0].clone(), ids[1].clone(), ids[3].clone()]);
    assert_eq!(books[0].description.as_deref(), Some("revised"));
}

#[tokio::test]
async fn duplicate_singular_routes_are_not_registered() {
    let app = app().await;
    let payload = json!({ "author": "A", "title": "T", "description": "D" }).to_string();
    let (status, _) = send(&app, Method::POST, "/book/create", Some(&payload)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn openapi_document_lists_book_routes() {
    let app = app().await;
    let (status, spec) = send(&app, Method::GET, "/docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(spec["paths"]["/books"]["get"].is_object());
    assert!(spec["paths"]["/books/create"]["post"].is_object());
    assert!(spec["paths"]["/books/{book_id}"]["patch"].is_object());
}
