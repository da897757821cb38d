// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use super::subject_for;
use crate::{
    auth::Auth,
    engine::{CompletionRecording, EngineError, ProgressOutcome, ProgressReport},
    error::{ApiError, ErrorBody},
    models::{UserAccessRecord, VerificationStatus},
    state::AppState,
};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgressRequest {
    /// Percentage; clamped to 0..=100.
    pub progress: i64,
    #[serde(default)]
    pub completed: bool,
    /// Assessment score, only for quizzes and assessments.
    #[serde(default)]
    pub score: Option<u32>,
    /// When the client produced the report. Reports queued offline carry
    /// their original time so older ones cannot overwrite newer ones.
    #[serde(default)]
    pub reported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProgressQuery {
    /// Learner to list. Staff only; defaults to the caller.
    pub user_id: Option<String>,
}

#[utoipa::path(
    put,
    path = "/v1/content/{content_id}/progress",
    params(("content_id" = String, Path, description = "Content identifier")),
    request_body = ProgressRequest,
    tag = "Progress",
    responses(
        (status = 200, description = "Progress applied, or discarded as stale", body = ProgressOutcome),
        (status = 400, body = ErrorBody),
        (status = 404, body = ErrorBody),
        (status = 412, description = "Caller has no access", body = ErrorBody),
        (status = 503, description = "Ledger unavailable", body = ErrorBody)
    )
)]
pub async fn update_progress(
    Auth(actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<ProgressOutcome>, ApiError> {
    let now = Utc::now();
    let content = state.engine.lifecycle.get(&content_id)?;
    if !actor.is_staff() && content.verification_status != VerificationStatus::Published {
        return Err(ApiError::not_found(format!("Not found: Content {content_id}")));
    }
    // Progress creates a granted record, so it must not outrun the access rules.
    if !state
        .engine
        .access
        .check_access(&actor.user_id, &content_id)
        .await?
    {
        return Err(EngineError::PreconditionFailed(format!(
            "user {} has no access to content {content_id}",
            actor.user_id
        ))
        .into());
    }

    let intent_at = request.reported_at.map_or(now, |at| at.min(now));
    let outcome = state
        .engine
        .progress
        .update_progress_at(
            &actor.user_id,
            &content_id,
            ProgressReport {
                progress: request.progress,
                completed: request.completed,
                score: request.score,
            },
            intent_at,
        )
        .await?;

    if let CompletionRecording::Failed { kind, message } = &outcome.completion {
        warn!(
            user_id = %actor.user_id,
            content_id = %content_id,
            ?kind,
            error = %message,
            "Completion saved locally but not on the ledger"
        );
    }
    Ok(Json(outcome))
}

#[utoipa::path(
    get,
    path = "/v1/content/{content_id}/progress",
    params(("content_id" = String, Path, description = "Content identifier")),
    tag = "Progress",
    responses(
        (status = 200, body = UserAccessRecord),
        (status = 404, description = "No progress recorded", body = ErrorBody)
    )
)]
pub async fn get_progress(
    Auth(actor): Auth,
    Path(content_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<UserAccessRecord>, ApiError> {
    let record = state
        .engine
        .progress
        .get_progress(&actor.user_id, &content_id)?;
    Ok(Json(record))
}

#[utoipa::path(
    get,
    path = "/v1/progress",
    params(ProgressQuery),
    tag = "Progress",
    responses(
        (status = 200, body = [UserAccessRecord]),
        (status = 403, body = ErrorBody)
    )
)]
pub async fn list_progress(
    Auth(actor): Auth,
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> Result<Json<Vec<UserAccessRecord>>, ApiError> {
    let user_id = subject_for(&actor, query.user_id)?;
    Ok(Json(state.engine.progress.list_progress(&user_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::content::tests::publish_via_api;
    use crate::auth::{Actor, Role};
    use crate::api::content::{
        create_content,
        tests::{creator, lesson},
    };
    use crate::auth::AuthorOnly;
    use crate::models::{CompletionStatus, ContentRecord};
    use axum::http::StatusCode;
    use chrono::Duration;

    fn learner() -> Actor {
        Actor::new("u-1", Role::Learner)
    }

    /// Publish a lesson and grant `u-1` access to it.
    async fn granted_lesson(state: &AppState, title: &str) -> ContentRecord {
        let record = publish_via_api(state, title).await;
        state
            .engine
            .access
            .grant_access("u-1", &record.id)
            .await
            .expect("grant succeeds");
        record
    }

    fn report(progress: i64, completed: bool) -> ProgressRequest {
        ProgressRequest {
            progress,
            completed,
            score: None,
            reported_at: None,
        }
    }

    #[tokio::test]
    async fn progress_updates_and_completes() {
        let state = AppState::default();
        let record = granted_lesson(&state, "fractions").await;

        let Json(first) = update_progress(
            Auth(learner()),
            Path(record.id.clone()),
            State(state.clone()),
            Json(report(40, false)),
        )
        .await
        .unwrap();
        assert_eq!(first.record.progress, 40);
        assert_eq!(first.record.completion_status, CompletionStatus::InProgress);

        let Json(done) = update_progress(
            Auth(learner()),
            Path(record.id.clone()),
            State(state.clone()),
            Json(report(100, true)),
        )
        .await
        .unwrap();
        assert!(done.newly_completed);
        assert_eq!(done.completion, CompletionRecording::Recorded);

        let Json(stored) = get_progress(Auth(learner()), Path(record.id), State(state))
            .await
            .unwrap();
        assert_eq!(stored.completion_status, CompletionStatus::Completed);
    }

    #[tokio::test]
    async fn older_offline_report_is_stale() {
        let state = AppState::default();
        let record = granted_lesson(&state, "fractions").await;

        update_progress(
            Auth(learner()),
            Path(record.id.clone()),
            State(state.clone()),
            Json(report(80, false)),
        )
        .await
        .unwrap();

        let mut late = report(20, false);
        late.reported_at = Some(Utc::now() - Duration::minutes(10));
        let Json(outcome) = update_progress(
            Auth(learner()),
            Path(record.id),
            State(state),
            Json(late),
        )
        .await
        .unwrap();
        assert!(outcome.stale);
        assert_eq!(outcome.record.progress, 80);
    }

    #[tokio::test]
    async fn score_on_lesson_is_rejected() {
        let state = AppState::default();
        let record = granted_lesson(&state, "fractions").await;
        let mut request = report(100, true);
        request.score = Some(90);

        let err = update_progress(Auth(learner()), Path(record.id), State(state), Json(request))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_progress_is_not_found() {
        let state = AppState::default();
        let record = granted_lesson(&state, "fractions").await;

        let err = get_progress(Auth(learner()), Path(record.id), State(state))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_progress_returns_callers_records() {
        let state = AppState::default();
        let first = granted_lesson(&state, "fractions").await;
        let second = granted_lesson(&state, "decimals").await;
        for id in [&first.id, &second.id] {
            update_progress(
                Auth(learner()),
                Path(id.clone()),
                State(state.clone()),
                Json(report(10, false)),
            )
            .await
            .unwrap();
        }

        let Json(records) = list_progress(
            Auth(learner()),
            State(state.clone()),
            Query(ProgressQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(records.len(), 2);

        let Json(other) = list_progress(
            Auth(Actor::new("admin-1", Role::Admin)),
            State(state),
            Query(ProgressQuery {
                user_id: Some("u-2".into()),
            }),
        )
        .await
        .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn reporting_progress_does_not_unlock_gated_content() {
        let state = AppState::default();
        let record = publish_via_api(&state, "fractions").await;
        let outsider = || Auth(Actor::new("u-9", Role::Learner));
        assert!(!state.engine.access.check_access("u-9", &record.id).await.unwrap());

        let err = update_progress(
            outsider(),
            Path(record.id.clone()),
            State(state.clone()),
            Json(report(0, false)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::PRECONDITION_FAILED);

        assert!(!state.engine.access.check_access("u-9", &record.id).await.unwrap());
        assert!(state.engine.progress.get_progress("u-9", &record.id).is_err());
        assert!(state.engine.access.open_content("u-9", &record.id).await.is_err());
    }

    #[tokio::test]
    async fn learners_cannot_report_on_unpublished_content() {
        let state = AppState::default();
        let (_, Json(draft)) = create_content(
            AuthorOnly(creator()),
            State(state.clone()),
            Json(lesson("decimals")),
        )
        .await
        .unwrap();
        state.engine.access.grant_access("u-1", &draft.id).await.unwrap();

        let err = update_progress(
            Auth(learner()),
            Path(draft.id.clone()),
            State(state.clone()),
            Json(report(10, false)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert!(!state
            .engine
            .progress
            .get_progress("u-1", &draft.id)
            .unwrap()
            .progress_reported_at
            .is_some());
    }
}
