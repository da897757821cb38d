// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for the calling actor.
//!
//! Use the `Auth` extractor in handlers to require an identified actor:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(actor): Auth) -> impl IntoResponse {
//!     // actor.user_id, actor.role
//! }
//! ```
//!
//! `AuthorOnly`, `ReviewerOnly` and `AdminOnly` additionally require a role.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use tracing::debug;

use super::{Actor, AuthError, Role};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Extractor for the identified actor. The role defaults to `learner`.
pub struct Auth(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers).map(Auth)
    }
}

/// Read the actor from gateway headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, AuthError> {
    let user_id = header_value(headers, ACTOR_ID_HEADER)?.ok_or(AuthError::MissingActor)?;
    let role = match header_value(headers, ACTOR_ROLE_HEADER)? {
        Some(raw) => Role::from_str(&raw).ok_or(AuthError::UnknownRole(raw))?,
        None => Role::default(),
    };
    Ok(Actor::new(user_id, role))
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidActorHeader)?
        .trim();
    if value.is_empty() {
        return Err(AuthError::InvalidActorHeader);
    }
    Ok(Some(value.to_string()))
}

fn require(parts: &Parts, required: Role) -> Result<Actor, AuthError> {
    let actor = actor_from_headers(&parts.headers)?;
    if !actor.has_role(required) {
        debug!(user_id = %actor.user_id, role = %actor.role, required = %required, "Role check failed");
        return Err(AuthError::InsufficientPermissions {
            role: actor.role,
            required,
        });
    }
    Ok(actor)
}

/// Extractor that requires the creator role (or admin).
pub struct AuthorOnly(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for AuthorOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, Role::Creator).map(AuthorOnly)
    }
}

/// Extractor that requires the reviewer role (or admin).
pub struct ReviewerOnly(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for ReviewerOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, Role::Reviewer).map(ReviewerOnly)
    }
}

/// Extractor that requires admin role.
pub struct AdminOnly(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require(parts, Role::Admin).map(AdminOnly)
    }
}
