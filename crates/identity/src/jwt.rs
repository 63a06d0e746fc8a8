use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
    #[error("token could not be issued")]
    Issue,
}

/// Bearer-token claims. `sub` is the acting user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

/// HS256 issue/verify pair sharing one secret.
pub struct TokenHandler {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_hours: u64,
}

impl TokenHandler {
    pub fn new(secret: &[u8], expiry_hours: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            expiry_hours,
        }
    }

    /// Issue a token for the given user, expiring after the configured
    /// number of hours.
    pub fn issue(&self, user_id: Uuid) -> Result<String, TokenError> {
        let exp = OffsetDateTime::now_utc().unix_timestamp() + self.expiry_hours as i64 * 3600;
        let claims = Claims { sub: user_id, exp };

        encode(&Header::default(), &claims, &self.encoding).map_err(|error| {
            tracing::error!(%error, "failed to sign bearer token");
            TokenError::Issue
        })
    }

    /// Verify signature and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|error| match error.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-at-least-32-bytes-long!!";

    #[test]
    fn issue_and_verify_round_trip() {
        let handler = TokenHandler::new(SECRET, 24);
        let user_id = Uuid::new_v4();

        let token = handler.issue(user_id).unwrap();
        let claims = handler.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
    }

    #[test]
    fn tampered_token_is_invalid() {
        let handler = TokenHandler::new(SECRET, 24);
        let other = TokenHandler::new(b"a-completely-different-secret-key!!!", 24);

        let token = other.issue(Uuid::new_v4()).unwrap();
        assert!(matches!(handler.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let handler = TokenHandler::new(SECRET, 24);
        let claims = Claims {
            sub: Uuid::new_v4(),
            // Expired an hour ago, beyond the default leeway.
            exp: OffsetDateTime::now_utc().unix_timestamp() - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(matches!(handler.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let handler = TokenHandler::new(SECRET, 24);
        assert!(matches!(
            handler.verify("not.a.token"),
            Err(TokenError::Invalid)
        ));
    }
}
