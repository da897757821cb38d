// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{FeedbackRecord, FeedbackSummary},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackRequest {
    /// Star rating; clamped to 1..=5.
    pub rating: i64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/content/{content_id}/feedback",
    params(("content_id" = String, Path, description = "Content identifier")),
    request_body = FeedbackRequest,
    tag = "Feedback",
    responses(
        (status = 201, body = FeedbackRecord),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn add_feedback(
    Auth(actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<(StatusCode, Json<FeedbackRecord>), ApiError> {
    let record = state.engine.feedback.add_feedback(
        &actor.user_id,
        &content_id,
        request.rating,
        request.comment,
    )?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/v1/content/{content_id}/feedback",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Feedback",
    responses(
        (status = 200, body = [FeedbackRecord]),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn list_feedback(
    Auth(_actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Vec<FeedbackRecord>>, ApiError> {
    Ok(Json(state.engine.feedback.list_feedback(&content_id)?))
}

#[utoipa::path(
    get,
    path = "/v1/content/{content_id}/feedback/summary",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Feedback",
    responses(
        (status = 200, body = FeedbackSummary),
        (status = 404, body = ErrorBody)
    )
)]
pub async fn feedback_summary(
    Auth(_actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<FeedbackSummary>, ApiError> {
    Ok(Json(state.engine.feedback.feedback_summary(&content_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::content::tests::publish_via_api;
    use crate::auth::{Actor, Role};

    fn learner(id: &str) -> Auth {
        Auth(Actor::new(id, Role::Learner))
    }

    #[tokio::test]
    async fn feedback_is_recorded_and_summarised() {
        let state = AppState::default();
        let record = publish_via_api(&state, "fractions").await;

        for (user, rating) in [("u-1", 5), ("u-2", 2), ("u-3", 9)] {
            let (status, _) = add_feedback(
                learner(user),
                Path(record.id.clone()),
                State(state.clone()),
                Json(FeedbackRequest {
                    rating,
                    comment: Some("  ".into()),
                }),
            )
            .await
            .unwrap();
            assert_eq!(status, StatusCode::CREATED);
        }

        let Json(entries) =
            list_feedback(learner("u-1"), Path(record.id.clone()), State(state.clone()))
                .await
                .unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.comment.is_none()));
        assert_eq!(entries[2].rating, 5);

        let Json(summary) = feedback_summary(learner("u-1"), Path(record.id), State(state))
            .await
            .unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, Some(4.0));
    }

    #[tokio::test]
    async fn feedback_on_unknown_content_is_not_found() {
        let err = add_feedback(
            learner("u-1"),
            Path("missing".into()),
            State(AppState::default()),
            Json(FeedbackRequest {
                rating: 3,
                comment: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_summary_has_no_average() {
        let state = AppState::default();
        let record = publish_via_api(&state, "fractions").await;

        let Json(summary) = feedback_summary(learner("u-1"), Path(record.id), State(state))
            .await
            .unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_rating, None);
    }
}
