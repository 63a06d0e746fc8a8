//! Identity provider for libris.
//!
//! Two independent pieces: Argon2id password hashing for registration and
//! login, and HS256 bearer tokens carrying the acting user id. Token
//! verification failures never reach the lending engine; the API layer
//! turns every one of them into an unauthenticated response.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenError, TokenHandler};
pub use password::{PasswordError, PasswordHasher};
