//! Error handling module
//!
//! Provides the HTTP-facing error type and its JSON representation.

use crate::bhap::BhapError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Bhap(#[from] BhapError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

fn bhap_status(e: &BhapError) -> (StatusCode, &'static str) {
    match e {
        BhapError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        BhapError::DuplicateVote { .. } => (StatusCode::CONFLICT, "DUPLICATE_VOTE"),
        BhapError::AllocationConflict => (StatusCode::CONFLICT, "ALLOCATION_CONFLICT"),
        BhapError::EmailTaken(_) => (StatusCode::CONFLICT, "CONFLICT"),
        BhapError::IllegalTransition { .. } => (StatusCode::BAD_REQUEST, "ILLEGAL_TRANSITION"),
        BhapError::NotEditable(_) => (StatusCode::BAD_REQUEST, "NOT_EDITABLE"),
        BhapError::VotingClosed(_) => (StatusCode::BAD_REQUEST, "VOTING_CLOSED"),
        BhapError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        BhapError::AuthorCannotVote => (StatusCode::FORBIDDEN, "AUTHOR_CANNOT_VOTE"),
        BhapError::InvalidVoteValue(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_VOTE_VALUE"),
        BhapError::InvalidStatus(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INVALID_STATUS"),
        BhapError::NoEligibleVoters => (StatusCode::INTERNAL_SERVER_ERROR, "NO_ELIGIBLE_VOTERS"),
        BhapError::InconsistentVoterCount { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INCONSISTENT_VOTER_COUNT")
        }
        BhapError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match &self {
            AppError::Bhap(e) if e.is_client_error() => {
                let (status, code) = bhap_status(e);
                (status, code, e.to_string(), None)
            }
            AppError::Bhap(e) => {
                error!("BHAP integrity error: {}", e);
                let (status, code) = bhap_status(e);
                (status, code, "An internal error occurred".to_string(), Some(e.to_string()))
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                msg.clone(),
                None,
            ),
            AppError::Unauthorized(msg) => {
                warn!("Rejected credentials: {}", msg);
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone(), None)
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    Some(msg.clone()),
                )
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            message,
            error: details,
            code: Some(error_code.to_string()),
        });

        (status, body).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, AppError>;

/// Helper function to create a validation error
pub fn validation_error(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bhap::Status;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::from(BhapError::NotFound(3)), StatusCode::NOT_FOUND),
            (
                AppError::from(BhapError::DuplicateVote { bhap_id: 1, voter_id: 2 }),
                StatusCode::CONFLICT,
            ),
            (AppError::from(BhapError::AuthorCannotVote), StatusCode::FORBIDDEN),
            (
                AppError::from(BhapError::VotingClosed(Status::Accepted)),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::from(BhapError::NoEligibleVoters), StatusCode::INTERNAL_SERVER_ERROR),
            (
                AppError::from(BhapError::InvalidVoteValue("Maybe".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::Unauthorized("no".to_string()), StatusCode::UNAUTHORIZED),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
