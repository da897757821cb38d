// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::subject_for;
use crate::{
    auth::{AdminOnly, Auth},
    engine::access::{AccessDecision, OpenedContent},
    error::{ApiError, ErrorBody},
    models::UserAccessRecord,
    state::AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessQuery {
    /// Learner to evaluate. Staff only; defaults to the caller.
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GrantRequest {
    pub user_id: String,
}

#[utoipa::path(
    get,
    path = "/v1/content/{content_id}/access",
    params(
        ("content_id" = String, Path, description = "Content identifier"),
        AccessQuery
    ),
    tag = "Access",
    responses(
        (status = 200, body = AccessDecision),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 503, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn check_access(
    Auth(actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessDecision>, ApiError> {
    let user_id = subject_for(&actor, query.user_id)?;
    let decision = state.engine.access.evaluate(&user_id, &content_id).await?;
    Ok(Json(decision))
}

#[utoipa::path(
    post,
    path = "/v1/content/{content_id}/access/grant",
    params(("content_id" = String, Path, description = "Content identifier")),
    request_body = GrantRequest,
    tag = "Access",
    responses(
        (status = 200, body = UserAccessRecord),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 502, description = "Ledger refused the grant", body = ErrorBody)
    )
)]
pub async fn grant_access(
    AdminOnly(_admin): AdminOnly,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<GrantRequest>,
) -> Result<Json<UserAccessRecord>, ApiError> {
    let record = state
        .engine
        .access
        .grant_access(&request.user_id, &content_id)
        .await?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/v1/content/{content_id}/open",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Access",
    responses(
        (status = 200, body = OpenedContent),
        (status = 404, body = ErrorBody),
        (status = 412, description = "Caller has no access", body = ErrorBody),
        (status = 503, body = ErrorBody)
    )
)]
pub async fn open_content(
    Auth(actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<OpenedContent>, ApiError> {
    let opened = state
        .engine
        .access
        .open_content(&actor.user_id, &content_id)
        .await?;
    Ok(Json(opened))
}
