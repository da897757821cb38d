// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeSet;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::subject_for;
use crate::{
    auth::{AdminOnly, Auth},
    error::{ApiError, ErrorBody},
    models::{AgeCohort, LearnerProfile},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileRequest {
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub age_cohort: Option<AgeCohort>,
    #[serde(default)]
    pub badges: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BadgeRequest {
    pub badge_id: String,
}

/// Learners may read only their own profile.
#[utoipa::path(
    get,
    path = "/v1/profiles/{user_id}",
    params(("user_id" = String, Path, description = "Learner identifier")),
    tag = "Profiles",
    responses(
        (status = 200, description = "Stored profile, or an empty one", body = LearnerProfile),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn get_profile(
    Auth(actor): Auth,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LearnerProfile>, ApiError> {
    let user_id = subject_for(&actor, Some(user_id))?;
    Ok(Json(state.engine.profiles.get_profile(&user_id)?))
}

#[utoipa::path(
    put,
    path = "/v1/profiles/{user_id}",
    params(("user_id" = String, Path, description = "Learner identifier")),
    request_body = ProfileRequest,
    tag = "Profiles",
    responses(
        (status = 200, body = LearnerProfile),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn set_profile(
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ProfileRequest>,
) -> Result<Json<LearnerProfile>, ApiError> {
    let profile = state
        .engine
        .profiles
        .set_profile(&user_id, request.age_cohort, request.badges)?;
    Ok(Json(profile))
}

#[utoipa::path(
    post,
    path = "/v1/profiles/{user_id}/badges",
    params(("user_id" = String, Path, description = "Learner identifier")),
    request_body = BadgeRequest,
    tag = "Profiles",
    responses(
        (status = 200, body = LearnerProfile),
        (status = 400, body = ErrorBody),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn award_badge(
    AdminOnly(_admin): AdminOnly,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<BadgeRequest>,
) -> Result<Json<LearnerProfile>, ApiError> {
    let profile = state
        .engine
        .profiles
        .award_badge(&user_id, &request.badge_id)?;
    Ok(Json(profile))
}
