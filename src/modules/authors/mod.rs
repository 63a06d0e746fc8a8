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
use libris_store::{AuthorStore, MemoryStore, NewAuthor};

use crate::modules::auth::extract::AuthUser;
use crate::modules::AppDeps;
use crate::utils::{map_store_error, resolve_page};
use models::{AuthorResponse, CreateAuthor};

const DEFAULT_PAGE_LIMIT: usize = 20;

/// Author catalogue CRUD.
pub struct AuthorsModule {
    state: AuthorsState,
}

#[derive(Clone)]
struct AuthorsState {
    store: Arc<MemoryStore>,
    tokens: Arc<TokenHandler>,
}

impl FromRef<AuthorsState> for Arc<MemoryStore> {
    fn from_ref(state: &AuthorsState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AuthorsState> for Arc<TokenHandler> {
    fn from_ref(state: &AuthorsState) -> Self {
        state.tokens.clone()
    }
}

impl AuthorsModule {
    pub fn new(deps: &AppDeps) -> Self {
        Self {
            state: AuthorsState {
                store: deps.store.clone(),
                tokens: deps.tokens.clone(),
            },
        }
    }
}

#[async_trait]
impl Module for AuthorsModule {
    fn name(&self) -> &'static str {
        "authors"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "authors module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/", post(create_author).get(list_authors))
            .route("/{author_id}", get(get_author))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/": {
                    "post": {
                        "summary": "Create an author",
                        "tags": ["Authors"],
                        "responses": {
                            "200": {
                                "description": "Created author",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Author"}
                                    }
                                }
                            }
                        }
                    },
                    "get": {
                        "summary": "List authors",
                        "tags": ["Authors"],
                        "responses": {
                            "200": {
                                "description": "Page of authors",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": {"$ref": "#/components/schemas/Author"}
                                        }
                                    }
                                }
                            }
                        }
                    }
                },
                "/{author_id}": {
                    "get": {
                        "summary": "Fetch one author",
                        "tags": ["Authors"],
                        "responses": {
                            "200": {
                                "description": "The author",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Author"}
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
                }
            },
            "components": {
                "schemas": {
                    "Author": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "format": "uuid"},
                            "name": {"type": "string"},
                            "bio": {"type": "string"},
                            "created_at": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "name", "created_at"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "authors module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "authors module stopped");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ListParams {
    offset: Option<usize>,
    limit: Option<usize>,
}

async fn create_author(
    State(state): State<AuthorsState>,
    _auth: AuthUser,
    Json(payload): Json<CreateAuthor>,
) -> Result<Json<AuthorResponse>, AppError> {
    let author = state
        .store
        .insert_author(NewAuthor {
            name: payload.name,
            bio: payload.bio,
        })
        .await
        .map_err(map_store_error)?;

    Ok(Json(author.into()))
}

async fn list_authors(
    State(state): State<AuthorsState>,
    _auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<AuthorResponse>>, AppError> {
    let (offset, limit) = resolve_page(params.offset, params.limit, DEFAULT_PAGE_LIMIT);

    let authors = state
        .store
        .list_authors(offset, limit)
        .await
        .map_err(map_store_error)?;

    Ok(Json(authors.into_iter().map(Into::into).collect()))
}

async fn get_author(
    State(state): State<AuthorsState>,
    _auth: AuthUser,
    Path(author_id): Path<Uuid>,
) -> Result<Json<AuthorResponse>, AppError> {
    let author = state
        .store
        .get_author(author_id)
        .await
        .map_err(map_store_error)?
        .ok_or_else(|| AppError::not_found("Author not found"))?;

    Ok(Json(author.into()))
}

/// Create a new instance of the authors module
pub fn create_module(deps: &AppDeps) -> Arc<dyn Module> {
    Arc::new(AuthorsModule::new(deps))
}
