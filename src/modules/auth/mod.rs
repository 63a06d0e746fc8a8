pub mod extract;
pub mod models;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRef, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use libris_http::error::AppError;
use libris_identity::{PasswordHasher, TokenHandler};
use libris_kernel::{InitCtx, Module};
use libris_store::{MemoryStore, NewUser, StoreError, UserStore};

use crate::modules::AppDeps;
use crate::utils::map_store_error;
use extract::AuthUser;
use models::{LoginRequest, RegisterRequest, TokenResponse, UserResponse};

/// Registration, login, and current-account lookup.
pub struct AuthModule {
    state: AuthState,
}

#[derive(Clone)]
struct AuthState {
    store: Arc<MemoryStore>,
    tokens: Arc<TokenHandler>,
    passwords: Arc<PasswordHasher>,
}

impl FromRef<AuthState> for Arc<MemoryStore> {
    fn from_ref(state: &AuthState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AuthState> for Arc<TokenHandler> {
    fn from_ref(state: &AuthState) -> Self {
        state.tokens.clone()
    }
}

impl AuthModule {
    pub fn new(deps: &AppDeps) -> Self {
        Self {
            state: AuthState {
                store: deps.store.clone(),
                tokens: deps.tokens.clone(),
                passwords: deps.passwords.clone(),
            },
        }
    }
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "auth module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/register", post(register))
            .route("/login", post(login))
            .route("/me", get(me))
            .with_state(self.state.clone())
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(json!({
            "paths": {
                "/register": {
                    "post": {
                        "summary": "Register a new account",
                        "tags": ["Auth"],
                        "responses": {
                            "200": {
                                "description": "Created account",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/User"}
                                    }
                                }
                            },
                            "409": {
                                "description": "Email already registered",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                },
                "/login": {
                    "post": {
                        "summary": "Exchange credentials for a bearer token",
                        "tags": ["Auth"],
                        "responses": {
                            "200": {
                                "description": "Bearer token",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/Token"}
                                    }
                                }
                            },
                            "401": {
                                "description": "Incorrect email or password",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/ErrorResponse"}
                                    }
                                }
                            }
                        }
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Current account",
                        "tags": ["Auth"],
                        "responses": {
                            "200": {
                                "description": "The authenticated account",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/User"}
                                    }
                                }
                            },
                            "401": {
                                "description": "Missing or invalid token",
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
                    "User": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string", "format": "uuid"},
                            "email": {"type": "string", "format": "email"},
                            "full_name": {"type": "string"},
                            "is_active": {"type": "boolean"},
                            "created_at": {"type": "string", "format": "date-time"}
                        },
                        "required": ["id", "email", "is_active", "created_at"]
                    },
                    "Token": {
                        "type": "object",
                        "properties": {
                            "access_token": {"type": "string"},
                            "token_type": {"type": "string"}
                        },
                        "required": ["access_token", "token_type"]
                    }
                }
            }
        }))
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "auth module stopped");
        Ok(())
    }
}

fn validate_registration(payload: &RegisterRequest) -> Result<(), AppError> {
    let mut details = Vec::new();
    if !payload.email.contains('@') {
        details.push(json!({"field": "email", "error": "must be a valid email address"}));
    }
    if payload.password.chars().count() < 8 {
        details.push(json!({"field": "password", "error": "must be at least 8 characters"}));
    }

    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(details, "Invalid registration payload"))
    }
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_registration(&payload)?;

    let hashed = state
        .passwords
        .hash(&payload.password)
        .map_err(|error| AppError::Internal(error.into()))?;

    let user = state
        .store
        .insert_user(NewUser {
            email: payload.email,
            full_name: payload.full_name,
            hashed_password: hashed,
        })
        .await
        .map_err(|error| match error {
            StoreError::UniqueViolation("users.email") => {
                AppError::conflict(vec![], "Email already registered")
            }
            other => map_store_error(other),
        })?;

    tracing::info!(user_id = %user.id, "account registered");
    Ok(Json(user.into()))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .store
        .find_user_by_email(&payload.email)
        .await
        .map_err(map_store_error)?;

    // Same rejection for unknown email and wrong password.
    let user = user
        .filter(|user| state.passwords.verify(&payload.password, &user.hashed_password))
        .ok_or_else(|| AppError::unauthorized("Incorrect email or password"))?;

    let access_token = state
        .tokens
        .issue(user.id)
        .map_err(|error| AppError::Internal(error.into()))?;

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

async fn me(auth: AuthUser) -> Json<UserResponse> {
    Json(auth.0.into())
}

/// Create a new instance of the auth module
pub fn create_module(deps: &AppDeps) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(deps))
}
