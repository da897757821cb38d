// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Actor,
    engine::{
        AccessBasis, AccessDecision, CompletionRecording, OpenedContent, ProgressOutcome,
    },
    error::{ApiError, ErrorBody},
    ledger::FailureKind,
    models::{
        AccessRequirement, CompletionStatus, ContentKind, ContentMetadata, ContentRecord,
        ContentUpdate, DifficultyLevel, FeedbackRecord, FeedbackSummary, LearnerProfile,
        LedgerRecord, NewContent, UserAccessRecord, VerificationDecision, VerificationStatus,
    },
    state::AppState,
};

pub mod access;
pub mod content;
pub mod feedback;
pub mod health;
pub mod profiles;
pub mod progress;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/content",
            get(content::list_content).post(content::create_content),
        )
        .route(
            "/content/{content_id}",
            get(content::get_content).patch(content::edit_content),
        )
        .route("/content/{content_id}/submit", post(content::submit_content))
        .route("/content/{content_id}/decision", post(content::record_decision))
        .route("/content/{content_id}/reject", post(content::reject_content))
        .route("/content/{content_id}/publish", post(content::publish_content))
        .route("/content/{content_id}/access", get(access::check_access))
        .route("/content/{content_id}/access/grant", post(access::grant_access))
        .route("/content/{content_id}/open", get(access::open_content))
        .route(
            "/content/{content_id}/progress",
            get(progress::get_progress).put(progress::update_progress),
        )
        .route("/progress", get(progress::list_progress))
        .route(
            "/content/{content_id}/feedback",
            get(feedback::list_feedback).post(feedback::add_feedback),
        )
        .route(
            "/content/{content_id}/feedback/summary",
            get(feedback::feedback_summary),
        )
        .route(
            "/profiles/{user_id}",
            get(profiles::get_profile).put(profiles::set_profile),
        )
        .route("/profiles/{user_id}/badges", post(profiles::award_badge))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CorsLayer::permissive()),
        )
}

/// Resolve whose records a request reads. Only staff may name someone else.
pub(crate) fn subject_for(actor: &Actor, requested: Option<String>) -> Result<String, ApiError> {
    match requested {
        Some(user_id) if user_id != actor.user_id && !actor.is_staff() => Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "insufficient_permissions",
            format!("Role {} cannot read records of other users", actor.role),
        )),
        Some(user_id) => Ok(user_id),
        None => Ok(actor.user_id.clone()),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        content::create_content,
        content::list_content,
        content::get_content,
        content::edit_content,
        content::submit_content,
        content::record_decision,
        content::reject_content,
        content::publish_content,
        access::check_access,
        access::grant_access,
        access::open_content,
        progress::update_progress,
        progress::get_progress,
        progress::list_progress,
        feedback::add_feedback,
        feedback::list_feedback,
        feedback::feedback_summary,
        profiles::get_profile,
        profiles::set_profile,
        profiles::award_badge
    ),
    components(
        schemas(
            ErrorBody,
            ContentRecord,
            ContentMetadata,
            ContentKind,
            DifficultyLevel,
            AccessRequirement,
            VerificationStatus,
            VerificationDecision,
            LedgerRecord,
            NewContent,
            ContentUpdate,
            content::DecisionRequest,
            content::RejectRequest,
            AccessBasis,
            AccessDecision,
            OpenedContent,
            access::GrantRequest,
            UserAccessRecord,
            CompletionStatus,
            CompletionRecording,
            FailureKind,
            ProgressOutcome,
            progress::ProgressRequest,
            FeedbackRecord,
            FeedbackSummary,
            feedback::FeedbackRequest,
            LearnerProfile,
            profiles::ProfileRequest,
            profiles::BadgeRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Content", description = "Authoring and catalogue"),
        (name = "Review", description = "Verification workflow and publishing"),
        (name = "Access", description = "Access evaluation and grants"),
        (name = "Progress", description = "Learner progress and completion"),
        (name = "Feedback", description = "Ratings and comments"),
        (name = "Profiles", description = "Learner cohorts and badges")
    )
)]
struct ApiDoc;
