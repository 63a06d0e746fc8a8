//! Shared helpers for the application modules.

use libris_http::error::AppError;
use libris_store::StoreError;

/// Largest page any list endpoint will serve.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Resolve optional offset/limit query parameters into a concrete page,
/// clamping the limit to [`MAX_PAGE_LIMIT`].
pub fn resolve_page(
    offset: Option<usize>,
    limit: Option<usize>,
    default_limit: usize,
) -> (usize, usize) {
    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(default_limit).min(MAX_PAGE_LIMIT);
    (offset, limit)
}

/// Default store-error translation for CRUD handlers. Unique violations
/// that a handler expects should be matched before falling through here.
pub fn map_store_error(error: StoreError) -> AppError {
    match error {
        StoreError::Unavailable(message) => AppError::unavailable(message),
        StoreError::UniqueViolation(what) => {
            AppError::conflict(vec![], format!("duplicate value for {what}"))
        }
    }
}
