use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// The caller identity established from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub role: String,
}

pub fn authenticate(secret: &str, token: &str) -> Result<AuthenticatedUser, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Authentication(e.to_string()))?;

    let claims = token_data.claims;
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Authentication("invalid subject claim".to_string()))?;

    Ok(AuthenticatedUser { id, role: claims.role })
}
