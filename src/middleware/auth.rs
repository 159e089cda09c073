use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::utils::token::decode_session_token;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Extractor for routes that require a logged-in account. Rejects
/// with 401 when the bearer token is missing, malformed or expired.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Extractor for routes that work anonymously but attach the account
/// when a valid token happens to be present. Never rejects.
#[derive(Debug, Clone, Copy)]
pub struct OptionalAuthUser(pub Option<Uuid>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            Error::Unauthorized("Missing or malformed Authorization header".to_string())
        })?;
        let claims = decode_session_token(token)
            .ok_or_else(|| Error::Unauthorized("Invalid or expired token".to_string()))?;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| Error::Unauthorized("Invalid token subject".to_string()))?;

        Ok(AuthUser { user_id })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OptionalAuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = bearer_token(parts)
            .and_then(decode_session_token)
            .and_then(|claims| Uuid::parse_str(&claims.sub).ok());

        Ok(OptionalAuthUser(user_id))
    }
}
