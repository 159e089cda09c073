use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use uuid::Uuid;

use crate::config::get_config;
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;

/// Session tokens stay valid for a week; clients are expected to log
/// in again after that.
pub const SESSION_TTL_DAYS: i64 = 7;

pub fn issue_session_token(user_id: Uuid) -> Result<String> {
    let config = get_config();
    let expires_at = Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::internal("Failed to issue session token", e))
}

/// Returns the claims only when the signature checks out and the
/// token has not expired.
pub fn decode_session_token(token: &str) -> Option<Claims> {
    let config = get_config();
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .ok()
}

/// Random alphanumeric token for password reset links.
pub fn generate_reset_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
