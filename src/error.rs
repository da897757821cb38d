// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

use crate::engine::EngineError;
use crate::ledger::FailureKind;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
    pub retryable: bool,
    pub failed_step: Option<&'static str>,
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code,
            retryable: false,
            failed_step: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_failed", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();
        let retryable = err.is_retryable();
        let mut api = match &err {
            EngineError::Validation(_) => ApiError::bad_request(message),
            EngineError::NotFound(_) => ApiError::not_found(message),
            EngineError::InvalidTransition { .. } => {
                ApiError::new(StatusCode::CONFLICT, "invalid_transition", message)
            }
            EngineError::PreconditionFailed(_) => {
                ApiError::new(StatusCode::PRECONDITION_FAILED, "precondition_failed", message)
            }
            EngineError::ExternalService { step, source } => {
                let status = match source.kind {
                    FailureKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                    FailureKind::Permanent => StatusCode::BAD_GATEWAY,
                    FailureKind::Indeterminate => StatusCode::GATEWAY_TIMEOUT,
                };
                let mut api = ApiError::new(status, "external_service_failed", message);
                api.failed_step = Some(step.as_str());
                api
            }
            EngineError::Conflict(_) => ApiError::new(StatusCode::CONFLICT, "conflict", message),
            EngineError::Storage(e) => {
                error!(error = %e, "Storage failure");
                ApiError::internal("Internal storage error")
            }
        };
        api.retryable = retryable;
        api
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
            retryable: self.retryable,
            failed_step: self.failed_step.map(str::to_string),
        });
        (self.status, body).into_response()
    }
}
