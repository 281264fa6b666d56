//! Request identity extractors
//!
//! Reads the `Authorization: Bearer` header and validates the access token.

use crate::auth::jwt::TokenType;
use crate::auth::{decode_token, Identity};
use crate::error::AppError;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

/// Requires a signed-in user
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Identity);

/// A signed-in user if a token was sent, otherwise an anonymous viewer.
///
/// A token that is present but invalid is still rejected.
#[derive(Debug, Clone, Copy)]
pub struct MaybeUser(pub Option<Identity>);

async fn identity_from_parts<S>(parts: &mut Parts, state: &S) -> Result<Identity, AppError>
where
    S: Send + Sync,
{
    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthorized("Missing or malformed authorization header".to_string()))?;

    let claims = decode_token(bearer.token())?;
    if claims.token_type != TokenType::Access {
        return Err(AppError::Unauthorized("Access token required".to_string()));
    }
    Ok(claims.identity())
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        identity_from_parts(parts, state).await.map(CurrentUser)
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeUser(None));
        }
        identity_from_parts(parts, state).await.map(|identity| MaybeUser(Some(identity)))
    }
}
