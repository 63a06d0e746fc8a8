use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use uuid::Uuid;

use libris_http::error::AppError;
use libris_identity::TokenHandler;
use libris_store::{MemoryStore, User, UserStore};

use crate::utils::map_store_error;

/// The authenticated account behind the current request.
///
/// Extraction fails with an unauthorized response when the bearer token is
/// missing, unverifiable, expired, or names a missing or deactivated
/// account. Handlers that take an `AuthUser` therefore never see an
/// unresolved actor.
pub struct AuthUser(pub User);

impl AuthUser {
    /// The acting user id for ownership checks.
    pub fn id(&self) -> Uuid {
        self.0.id
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<TokenHandler>: FromRef<S>,
    Arc<MemoryStore>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = Arc::<TokenHandler>::from_ref(state);
        let store = Arc::<MemoryStore>::from_ref(state);

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::unauthorized("Missing bearer token"))?;

        let claims = tokens.verify(token).map_err(|error| {
            tracing::debug!(%error, "bearer token rejected");
            AppError::unauthorized("Invalid or expired token")
        })?;

        let user = store
            .get_user(claims.sub)
            .await
            .map_err(map_store_error)?
            .filter(|user| user.is_active)
            .ok_or_else(|| AppError::unauthorized("Invalid or expired token"))?;

        Ok(AuthUser(user))
    }
}
