pub mod models;
pub mod routes;
pub mod service;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bookshelf_kernel::settings::BooksSettings;
use bookshelf_kernel::{InitCtx, Module};
use serde_json::json;

use service::BookService;
use store::BookStore;

/// Books module: CRUD over the book collection
pub struct BooksModule {
    service: BookService,
}

impl BooksModule {
    pub fn new(store: Arc<dyn BookStore>, settings: &BooksSettings) -> Self {
        Self {
            service: BookService::new(store, settings.upsert_on_update),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            collection = %ctx.settings.books.collection,
            upsert_on_update = self.service.upsert_on_update(),
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        routes::router(self.service.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error_response = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                    }
                }
            })
        };
        let message_response = |description: &str| {
            json!({
                "description": description,
                "content": {
                    "application/json": {
                        "schema": { "$ref": "#/components/schemas/StatusMessage" }
                    }
                }
            })
        };
        let id_parameter = json!({
            "name": "book_id",
            "in": "path",
            "required": true,
            "description": "24-character hex object id",
            "schema": { "type": "string", "pattern": "^[0-9a-fA-F]{24}$" }
        });

        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Every book, unpaginated",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            },
                            "500": error_response("Storage failure")
                        }
                    }
                },
                "/create": {
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/CreateBook" }
                                }
                            }
                        },
                        "responses": {
                            "201": {
                                "description": "Book inserted",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/InsertedBook" }
                                    }
                                }
                            },
                            "400": error_response("Malformed body or missing field"),
                            "500": error_response("Storage failure")
                        }
                    }
                },
                "/{book_id}": {
                    "get": {
                        "summary": "Get a book",
                        "tags": ["Books"],
                        "parameters": [id_parameter.clone()],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Book" }
                                    }
                                }
                            },
                            "400": error_response("Malformed id"),
                            "500": error_response("Lookup failed or no such book")
                        }
                    },
                    "patch": {
                        "summary": "Update the supplied fields of a book",
                        "tags": ["Books"],
                        "parameters": [id_parameter.clone()],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/UpdateBook" }
                                }
                            }
                        },
                        "responses": {
                            "200": message_response("Book updated, or upserted when the id is unknown"),
                            "400": error_response("Malformed id or body"),
                            "404": error_response("Unknown id with upsert disabled"),
                            "500": error_response("Storage failure")
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "parameters": [id_parameter],
                        "responses": {
                            "200": message_response("Book deleted, or there was nothing to delete"),
                            "400": error_response("Malformed id"),
                            "500": error_response("Storage failure")
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "author": { "type": ["string", "null"] },
                            "title": { "type": ["string", "null"] },
                            "description": { "type": ["string", "null"] },
                            "created_at": { "type": ["string", "null"], "format": "date-time" },
                            "updated_at": { "type": ["string", "null"], "format": "date-time" }
                        },
                        "required": ["id"]
                    },
                    "CreateBook": {
                        "type": "object",
                        "properties": {
                            "author": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" }
                        },
                        "required": ["author", "title", "description"]
                    },
                    "UpdateBook": {
                        "type": "object",
                        "properties": {
                            "author": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" }
                        }
                    },
                    "InsertedBook": {
                        "type": "object",
                        "properties": {
                            "inserted_id": { "type": "string" }
                        },
                        "required": ["inserted_id"]
                    },
                    "StatusMessage": {
                        "type": "object",
                        "properties": {
                            "message": { "type": "string" }
                        },
                        "required": ["message"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module(store: Arc<dyn BookStore>, settings: &BooksSettings) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(store, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::store::InMemoryBookStore;

    #[test]
    fn openapi_fragment_covers_every_route() {
        let module = BooksModule::new(Arc::new(InMemoryBookStore::new()), &BooksSettings::default());
        let spec = module.openapi().unwrap();

        assert!(spec["paths"]["/"]["get"].is_object());
        assert!(spec["paths"]["/create"]["post"].is_object());
        for method in ["get", "patch", "delete"] {
            assert!(spec["paths"]["/{book_id}"][method].is_object(), "{method}");
        }
        assert!(spec["components"]["schemas"]["Book"].is_object());
    }
}
