// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Actor identification errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::Role;

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// No actor id header present
    MissingActor,
    /// Header value is not visible ASCII or is blank
    InvalidActorHeader,
    /// Role header names no known role
    UnknownRole(String),
    /// Actor lacks the role an endpoint requires
    InsufficientPermissions { role: Role, required: Role },
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingActor => "missing_actor",
            AuthError::InvalidActorHeader => "invalid_actor_header",
            AuthError::UnknownRole(_) => "unknown_role",
            AuthError::InsufficientPermissions { .. } => "insufficient_permissions",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingActor | AuthError::InvalidActorHeader | AuthError::UnknownRole(_) => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingActor => write!(f, "x-actor-id header is required"),
            AuthError::InvalidActorHeader => write!(f, "Actor headers must be non-blank ASCII"),
            AuthError::UnknownRole(role) => write!(f, "Unknown actor role '{role}'"),
            AuthError::InsufficientPermissions { role, required } => {
                write!(f, "Role {role} cannot perform this operation (requires {required})")
            }
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
