pub mod engine;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use libris_http::error::AppError;
use libris_identity::TokenHandler;
use libris_kernel::{InitCtx, Module};
use libris_store::MemoryStore;

use crate::modules::auth::extract::AuthUser;
use crate::modules::AppDeps;
use crate::utils::resolve_page;
use engine::{LendError, LendingEngine};
use models::{BorrowRecordResponse, BorrowRequest};

const DEFAULT_PAGE_LIMIT: usize = 50;

/// Borrowing, returning, and borrow history. All writes to a book's
/// availability in the whole application happen inside this module's
/// engine.
pub struct LendingModule {
    state: LendingState,
}

#[derive(Clone)]
struct LendingState {
    engine: Arc<LendingEngine<MemoryStore>>,
    store: Arc<MemoryStore>,
    tokens: Arc<TokenHandler>,
}

impl FromRef<LendingState> for Arc<MemoryStore> {
    fn from_ref(state: &LendingState) -> Self {
        state.store.clone()
    }
}

impl FromRef<LendingState> for Arc<TokenHandler> {
    fn from_ref(state: &LendingState) -> Self {
        state.tokens.clone()
    }
}

impl LendingModule {
    pub fn new(deps: &AppDeps) -> Self {
        Self {
            state: LendingState {
                engine: Arc::new(LendingEngine::new(deps.store.clone())),
                store: deps.store.clone(),
                tokens: deps.tokens.clone(),
            },
        }
    }
}

impl From<LendError> for AppError {
    fn from(error: LendError) -> Self {
        match error {
            LendError::NotFound(entity) => AppError::not_found(format!("{entity} not found")),
            LendError::Conflict(reason) => AppError::conflict(vec![], reason.to_string()),
            LendError::Forbidden(reason) => AppError::forbidden(reason.to_string()),
            LendError::Unavailable(message) => AppError::unavailable(message),
        }
    }
}

#[async_trait]
impl Module for LendingModule {
    fn name(&self) -> &'static str {
        "lending"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "lending module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/borrow", post(borrow_book))
            .route("/return/{record_id}", post(return_book))
            .route("/history", get(borrow_history))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/borrow": {
                    "post": {
                        "summary": "Borrow a book",
                        "tags": ["Lending"],
                        "responses": {
                            "200": {
                                "description": "The created borrow record",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/BorrowRecord"}
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
                            },
                            "409": {
                                "description": "Book is currently not available",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                },
                "/return/{record_id}": {
                    "post": {
                        "summary": "Return a borrowed book",
                        "tags": ["Lending"],
                        "responses": {
                            "200": {
                                "description": "The closed borrow record",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/BorrowRecord"}
                                    }
                                }
                            },
                            "403": {
                                "description": "Not allowed to return this record",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            },
                            "404": {
                                "description": "Borrow record not found",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            },
                            "409": {
                                "description": "Book already returned",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                },
                "/history": {
                    "get": {
                        "summary": "Borrow history for the current user",
                        "tags": ["Lending"],
                        "parameters": [
                            {"name": "offset", "in": "query", "schema": {"type": "integer"}},
                            {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                        ],
                        "responses": {
                            "200": {
                                "description": "Page of borrow records, newest first",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {"$ref": "#/components/schemas/BorrowRecord"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "BorrowRecord": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "format": "uuid"},
                            "user_id": {"type": "string", "format": "uuid"},
                            "book_id": {"type": "string", "format": "uuid"},
                            "borrow_date": {"type": "string", "format": "date-time"},
                            "return_date": {"type": "string", "format": "date-time", "nullable": true}
                        },
                        "required": ["id", "user_id", "book_id", "borrow_date"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "lending module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "lending module stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct HistoryParams {
    offset: Option<usize>,
    limit: Option<usize>,
}

async fn borrow_book(
    State(state): State<LendingState>,
    auth: AuthUser,
    Json(payload): Json<BorrowRequest>,
) -> Result<Json<BorrowRecordResponse>, AppError> {
    let record = state.engine.borrow(auth.id(), payload.book_id).await?;
    Ok(Json(record.into()))
}

async fn return_book(
    State(state): State<LendingState>,
    auth: AuthUser,
    Path(record_id): Path<Uuid>,
) -> Result<Json<BorrowRecordResponse>, AppError> {
    let record = state.engine.give_back(auth.id(), record_id).await?;
    Ok(Json(record.into()))
}

async fn borrow_history(
    State(state): State<LendingState>,
    auth: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<BorrowRecordResponse>>, AppError> {
    let (offset, limit) = resolve_page(params.offset, params.limit, DEFAULT_PAGE_LIMIT);

    let records = state.engine.history(auth.id(), offset, limit).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Create a new instance of the lending module
pub fn create_module(deps: &AppDeps) -> Arc<dyn Module> {
    Arc::new(LendingModule::new(deps))
}
