// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{Auth, AuthorOnly, ReviewerOnly},
    error::{ApiError, ErrorBody},
    models::{
        AgeCohort, ContentFilter, ContentKind, ContentRecord, ContentUpdate, DifficultyLevel,
        NewContent, VerificationStatus,
    },
    state::AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    pub kind: Option<ContentKind>,
    pub level: Option<DifficultyLevel>,
    /// Audience bracket, compared case-insensitively.
    pub age_cohort: Option<String>,
    pub module_id: Option<String>,
    /// Ignored for learners, who only see published content.
    pub status: Option<VerificationStatus>,
}

impl From<ContentQuery> for ContentFilter {
    fn from(query: ContentQuery) -> Self {
        ContentFilter {
            kind: query.kind,
            level: query.level,
            age_cohort: query.age_cohort.map(AgeCohort::from),
            module_id: query.module_id,
            status: query.status,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DecisionRequest {
    pub approved: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RejectRequest {
    pub comments: String,
}

#[utoipa::path(
    post,
    path = "/v1/content",
    request_body = NewContent,
    tag = "Content",
    responses(
        (status = 201, body = ContentRecord),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn create_content(
    AuthorOnly(actor): AuthorOnly,
    State(state): State<AppState>,
    Json(request): Json<NewContent>,
) -> Result<(StatusCode, Json<ContentRecord>), ApiError> {
    let record = state.engine.lifecycle.create(request, &actor.user_id)?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/v1/content",
    params(ContentQuery),
    tag = "Content",
    responses((status = 200, body = [ContentRecord]))
)]
pub async fn list_content(
    Auth(actor): Auth,
    State(state): State<AppState>,
    Query(query): Query<ContentQuery>,
) -> Result<Json<Vec<ContentRecord>>, ApiError> {
    let mut filter = ContentFilter::from(query);
    if !actor.is_staff() {
        filter.status = Some(VerificationStatus::Published);
    }
    debug!(user_id = %actor.user_id, ?filter, "Listing content");
    Ok(Json(state.engine.lifecycle.list(&filter)?))
}

#[utoipa::path(
    get,
    path = "/v1/content/{content_id}",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Content",
    responses(
        (status = 200, body = ContentRecord),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn get_content(
    Auth(actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ContentRecord>, ApiError> {
    let record = state.engine.lifecycle.get(&content_id)?;
    if !actor.is_staff() && record.verification_status != VerificationStatus::Published {
        return Err(ApiError::not_found(format!("Not found: Content {content_id}")));
    }
    Ok(Json(record))
}

#[utoipa::path(
    patch,
    path = "/v1/content/{content_id}",
    params(("content_id" = String, Path, description = "Content identifier")),
    request_body = ContentUpdate,
    tag = "Content",
    responses(
        (status = 200, description = "Updated; signed-off content returns to review", body = ContentRecord),
        (status = 400, body = ErrorBody),
        (status = 409, description = "Rejected content cannot be edited", body = ErrorBody)
    )
)]
pub async fn edit_content(
    AuthorOnly(actor): AuthorOnly,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ContentUpdate>,
) -> Result<Json<ContentRecord>, ApiError> {
    let record = state
        .engine
        .lifecycle
        .edit(&content_id, &actor.user_id, request)
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/v1/content/{content_id}/submit",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Review",
    responses(
        (status = 200, body = ContentRecord),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn submit_content(
    AuthorOnly(actor): AuthorOnly,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ContentRecord>, ApiError> {
    let record = state
        .engine
        .lifecycle
        .submit_for_review(&content_id, &actor.user_id)
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/v1/content/{content_id}/decision",
    params(("content_id" = String, Path, description = "Content identifier")),
    request_body = DecisionRequest,
    tag = "Review",
    responses(
        (status = 200, body = ContentRecord),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn record_decision(
    ReviewerOnly(actor): ReviewerOnly,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ContentRecord>, ApiError> {
    let record = state
        .engine
        .lifecycle
        .record_decision(&content_id, &actor.user_id, request.approved, request.comments)
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/v1/content/{content_id}/reject",
    params(("content_id" = String, Path, description = "Content identifier")),
    request_body = RejectRequest,
    tag = "Review",
    responses(
        (status = 200, body = ContentRecord),
        (status = 400, description = "Comments are required", body = ErrorBody),
        (status = 409, body = ErrorBody)
    )
)]
pub async fn reject_content(
    ReviewerOnly(actor): ReviewerOnly,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<ContentRecord>, ApiError> {
    let record = state
        .engine
        .lifecycle
        .reject(&content_id, &actor.user_id, request.comments)
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    post,
    path = "/v1/content/{content_id}/publish",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Review",
    responses(
        (status = 200, body = ContentRecord),
        (status = 412, description = "Content is not verified", body = ErrorBody),
        (status = 502, description = "Collaborator refused the request", body = ErrorBody),
        (status = 503, description = "Collaborator unavailable, retry later", body = ErrorBody),
        (status = 504, description = "Collaborator outcome unknown", body = ErrorBody)
    )
)]
pub async fn publish_content(
    ReviewerOnly(actor): ReviewerOnly,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ContentRecord>, ApiError> {
    let record = state
        .engine
        .lifecycle
        .publish(&content_id, &actor.user_id)
        .await?;
    Ok(Json(record))
}
