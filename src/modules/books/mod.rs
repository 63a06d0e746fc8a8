pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use libris_http::error::AppError;
use libris_identity::TokenHandler;
use libris_kernel::{InitCtx, Module};
use libris_store::{AuthorStore, BookFilter, BookStore, MemoryStore, NewBook};

use crate::modules::auth::extract::AuthUser;
use crate::modules::AppDeps;
use crate::utils::{map_store_error, resolve_page};
use models::{BookResponse, CreateBook, UpdateBook};

const DEFAULT_PAGE_LIMIT: usize = 20;

/// Book catalogue CRUD. Loan state is read-only here: listings expose
/// `available`, but nothing in this module can change it.
pub struct BooksModule {
    state: BooksState,
}

#[derive(Clone)]
struct BooksState {
    store: Arc<MemoryStore>,
    tokens: Arc<TokenHandler>,
}

impl FromRef<BooksState> for Arc<MemoryStore> {
    fn from_ref(state: &BooksState) -> Self {
        state.store.clone()
    }
}

impl FromRef<BooksState> for Arc<TokenHandler> {
    fn from_ref(state: &BooksState) -> Self {
        state.tokens.clone()
    }
}

impl BooksModule {
    pub fn new(deps: &AppDeps) -> Self {
        Self {
            state: BooksState {
                store: deps.store.clone(),
                tokens: deps.tokens.clone(),
            },
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
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", get(list_books).post(create_book))
            .route(
                "/{book_id}",
                get(get_book).patch(update_book).delete(delete_book),
            )
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "get": {
                        "summary": "List books",
                        "tags": ["Books"],
                        "parameters": [
                            {"name": "title", "in": "query", "schema": {"type": "string"}},
                            {"name": "author_name", "in": "query", "schema": {"type": "string"}},
                            {"name": "available", "in": "query", "schema": {"type": "boolean"}},
                            {"name": "offset", "in": "query", "schema": {"type": "integer"}},
                            {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "Page of books",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {"$ref": "#/components/schemas/Book"}
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "summary": "Create a book",
                        "tags": ["Books"],
                        "responses": {
                            "201": {
                                "description": "Created book",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Book"}
                                    }
                                }
                            },
                            "404": {
                                "description": "Author not found",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                },
                "/{book_id}": {
                    "get": {
                        "summary": "Fetch one book",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "The book",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Book"}
                                    }
                                }
                            },
                            "404": {
                                "description": "Book not found",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    },
                    "patch": {
                        "summary": "Partially update a book",
                        "tags": ["Books"],
                        "responses": {
                            "200": {
                                "description": "Updated book",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Book"}
                                    }
                                }
                            },
                            "404": {
                                "description": "Book or author not found",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    },
                    "delete": {
                        "summary": "Delete a book",
                        "tags": ["Books"],
                        "responses": {
                            "204": {"description": "Deleted"},
                            "404": {
                                "description": "Book not found",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Book": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "format": "uuid"},
                            "title": {"type": "string"},
                            "description": {"type": "string"},
                            "publication_date": {"type": "string"},
                            "author_id": {"type": "string", "format": "uuid"},
                            "available": {"type": "boolean"},
                            "created_at": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "title", "author_id", "available", "created_at"]
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

#[derive(Debug, Deserialize)]
struct BookListParams {
    title: Option<String>,
    author_name: Option<String>,
    available: Option<bool>,
    offset: Option<usize>,
    limit: Option<usize>,
}

async fn create_book(
    State(state): State<BooksState>,
    _auth: AuthUser,
    Json(payload): Json<CreateBook>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    // ensure author exists
    state
        .store
        .get_author(payload.author_id)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| AppError::not_found("Author not found"))?;

    let book = state
        .store
        .insert_book(NewBook {
            title: payload.title,
            description: payload.description,
            publication_date: payload.publication_date,
            author_id: payload.author_id,
        })
        .await
        .map_err(map_store_error)?;

    Ok((StatusCode::CREATED, Json(book.into())))
}

async fn list_books(
    State(state): State<BooksState>,
    _auth: AuthUser,
    Query(params): Query<BookListParams>,
) -> Result<Json<Vec<BookResponse>>, AppError> {
    let (offset, limit) = resolve_page(params.offset, params.limit, DEFAULT_PAGE_LIMIT);

    let books = state
        .store
        .list_books(BookFilter {
            title: params.title,
            author_name: params.author_name,
            available: params.available,
            offset,
            limit,
        })
        .await
        .map_err(map_store_error)?;

    Ok(Json(books.into_iter().map(Into::into).collect()))
}

async fn get_book(
    State(state): State<BooksState>,
    _auth: AuthUser,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookResponse>, AppError> {
    let book = state
        .store
        .get_book(book_id)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| AppError::not_found("Book not found"))?;

    Ok(Json(book.into()))
}

async fn update_book(
    State(state): State<BooksState>,
    _auth: AuthUser,
    Path(book_id): Path<Uuid>,
    Json(payload): Json<UpdateBook>,
) -> Result<Json<BookResponse>, AppError> {
    // if author_id provided, check author exists
    if let Some(author_id) = payload.author_id {
        state
            .store
            .get_author(author_id)
            .await
            .map_err(map_store_error)?
            .ok_or_else(|| AppError::not_found("Author not found"))?;
    }

    let book = state
        .store
        .update_book(book_id, payload.into())
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| AppError::not_found("Book not found"))?;

    Ok(Json(book.into()))
}

async fn delete_book(
    State(state): State<BooksState>,
    _auth: AuthUser,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let deleted = state
        .store
        .delete_book(book_id)
        .await
        .map_err(map_store_error)?;

    if !deleted {
        return Err(AppError::not_found("Book not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Create a new instance of the books module
pub fn create_module(deps: &AppDeps) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(deps))
}
