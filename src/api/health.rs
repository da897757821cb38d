// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Whether the content store answers a read.
    pub storage: String,
    /// Backend kinds in use, e.g. `redb` or `memory`.
    pub storage_backend: String,
    pub ledger_backend: String,
    pub blob_storage_backend: String,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint handler.
///
/// Returns 200 if the store answers, 503 otherwise. Collaborators are not
/// probed; their failures surface per request.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let storage_ok = state.engine.lifecycle.check_storage().is_ok();

    let response = ReadyResponse {
        status: if storage_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            storage: if storage_ok { "ok" } else { "unavailable" }.to_string(),
            storage_backend: state.backends.storage.to_string(),
            ledger_backend: state.backends.ledger.to_string(),
            blob_storage_backend: state.backends.blob_storage.to_string(),
        },
    };

    let status = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn health_reports_backends() {
        let (status, Json(body)) = health(State(AppState::default())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert_eq!(body.checks.storage, "ok");
        assert_eq!(body.checks.storage_backend, "memory");
    }

    #[tokio::test]
    async fn health_stays_ok_with_stored_content() {
        let state = AppState::default();
        crate::api::content::tests::publish_via_api(&state, "fractions").await;

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.checks.storage, "ok");
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
