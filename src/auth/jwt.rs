//! JWT token management
//!
//! Handles creation, validation, and refresh of JWT tokens.

use crate::auth::{Identity, Role};
use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// JWT secret key (should be from environment in production)
static JWT_SECRET: Lazy<String> = Lazy::new(|| {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| {
        "bhap-dev-secret-key-change-in-production".to_string()
    })
});

/// Access token expiration (15 minutes)
const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Refresh token expiration (7 days)
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i64,
    pub email: String,
    pub role: Role,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_type: TokenType,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub,
            role: self.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token pair response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn sign(user_id: i64, email: &str, role: Role, token_type: TokenType, lifetime: Duration) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        role,
        exp: (now + lifetime).timestamp(),
        iat: now.timestamp(),
        token_type,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create {:?} token: {}", token_type, e)))
}

/// Create access and refresh tokens for a user
pub fn create_tokens(user_id: i64, email: &str, role: Role) -> Result<TokenPair, AppError> {
    let access_token = sign(
        user_id,
        email,
        role,
        TokenType::Access,
        Duration::minutes(ACCESS_TOKEN_EXPIRATION_MINUTES),
    )?;
    let refresh_token = sign(
        user_id,
        email,
        role,
        TokenType::Refresh,
        Duration::days(REFRESH_TOKEN_EXPIRATION_DAYS),
    )?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_EXPIRATION_MINUTES * 60,
    })
}

/// Decode and validate a JWT token
pub fn decode_token(token: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidToken => {
            AppError::Unauthorized("Invalid token".to_string())
        }
        _ => AppError::Unauthorized(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Refresh tokens using a valid refresh token
pub fn refresh_tokens(refresh_token: &str) -> Result<TokenPair, AppError> {
    let claims = decode_token(refresh_token)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized("Invalid token type for refresh".to_string()));
    }

    create_tokens(claims.sub, &claims.email, claims.role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip() {
        let tokens = create_tokens(42, "ada@example.com", Role::Admin).unwrap();
        let claims = decode_token(&tokens.access_token).unwrap();

        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.identity(), Identity { user_id: 42, role: Role::Admin });
    }

    #[test]
    fn test_refresh_requires_refresh_token() {
        let tokens = create_tokens(7, "bob@example.com", Role::Member).unwrap();

        assert!(refresh_tokens(&tokens.access_token).is_err());
        let renewed = refresh_tokens(&tokens.refresh_token).unwrap();
        assert_eq!(decode_token(&renewed.access_token).unwrap().sub, 7);
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        assert!(matches!(decode_token("not-a-jwt"), Err(AppError::Unauthorized(_))));
    }
}
