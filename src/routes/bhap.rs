//! BHAP routes
//!
//! Listing, viewing, authoring, status changes and voting.

use crate::auth::{CurrentUser, MaybeUser};
use crate::bhap::{Bhap, BhapError, BhapSummary, BhapView, Status, Vote, VoteValue};
use crate::error::{validation_error, ApiResult};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use validator::Validate;

// =============================================================================
// REQUEST/RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BhapRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: Status,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub value: VoteValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BhapListResponse {
    pub bhaps: Vec<BhapSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BhapResponse {
    pub bhap: Bhap,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub vote: Vote,
}

// =============================================================================
// HANDLERS
// =============================================================================

/// GET /api/bhaps
pub async fn list_bhaps(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<BhapListResponse>>> {
    let bhaps = state.bhaps.list().await?;
    Ok(Json(SuccessResponse::with_data(
        format!("Found {} BHAPs", bhaps.len()),
        BhapListResponse { bhaps },
    )))
}

/// POST /api/bhaps
///
/// Retries the whole create when id allocation collides with another request.
pub async fn create_bhap(
    State(state): State<SharedState>,
    CurrentUser(author): CurrentUser,
    Json(req): Json<BhapRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<BhapResponse>>)> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let mut attempt = 1;
    let bhap = loop {
        match state
            .bhaps
            .create(author, req.title.clone(), req.content.clone())
            .await
        {
            Err(BhapError::AllocationConflict) if attempt < state.bhap_config.create_retry_limit => {
                warn!("BHAP id allocation collided (attempt {}), retrying", attempt);
                attempt += 1;
            }
            result => break result?,
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("BHAP created", BhapResponse { bhap })),
    ))
}

/// GET /api/bhaps/{id}
pub async fn get_bhap(
    State(state): State<SharedState>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<SuccessResponse<BhapView>>> {
    let view = state.bhaps.view(id, viewer).await?;
    Ok(Json(SuccessResponse::with_data("BHAP retrieved", view)))
}

/// PUT /api/bhaps/{id}
pub async fn edit_bhap(
    State(state): State<SharedState>,
    CurrentUser(editor): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<BhapRequest>,
) -> ApiResult<Json<SuccessResponse<BhapResponse>>> {
    req.validate().map_err(|e| validation_error(e.to_string()))?;

    let bhap = state.bhaps.edit(id, editor, req.title, req.content).await?;
    Ok(Json(SuccessResponse::with_data("BHAP updated", BhapResponse { bhap })))
}

/// POST /api/bhaps/{id}/status
pub async fn change_status(
    State(state): State<SharedState>,
    CurrentUser(actor): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<SuccessResponse<BhapResponse>>> {
    let bhap = state.bhaps.transition(id, actor, req.status).await?;
    Ok(Json(SuccessResponse::with_data(
        format!("BHAP moved to {}", bhap.status),
        BhapResponse { bhap },
    )))
}

/// POST /api/bhaps/{id}/vote
pub async fn cast_vote(
    State(state): State<SharedState>,
    CurrentUser(voter): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<(StatusCode, Json<SuccessResponse<VoteResponse>>)> {
    let vote = state.bhaps.cast_vote(id, voter, req.value).await?;
    Ok((
        StatusCode::CREATED,
        Json(SuccessResponse::with_data("Vote recorded", VoteResponse { vote })),
    ))
}
