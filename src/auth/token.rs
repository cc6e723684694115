use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::auth::user::UserAccount;
use crate::error::AppError;

/// Signed token payload. Carries enough identity to authorize a request
/// without a database round trip; `verify` re-checks the row when the
/// client asks for it explicitly.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub exp: i64,
}

pub fn issue_token(user: &UserAccount, secret: &str, ttl_hours: i64) -> Result<String, AppError> {
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let claims = Claims {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        role: user.role.to_string(),
        exp: expires_at.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing error: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))
}
