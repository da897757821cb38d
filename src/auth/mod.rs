// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Actor Identification
//!
//! Requests reach this service through an authenticating gateway which
//! forwards the caller's identity in two headers:
//!
//! - `x-actor-id`: canonical user id (required)
//! - `x-actor-role`: `admin`, `reviewer`, `creator` or `learner`
//!   (default `learner`)
//!
//! ## Access Rules
//!
//! - Authoring (create, edit, submit) requires `creator`
//! - Review decisions, rejection and publishing require `reviewer`
//! - Explicit grants and learner profile writes require `admin`
//! - Learners only ever see `Published` content
//! - `/health` and `/docs` need no identity

pub mod actor;
pub mod error;
pub mod extractor;
pub mod roles;

pub use actor::Actor;
pub use error::AuthError;
pub use extractor::{AdminOnly, Auth, AuthorOnly, ReviewerOnly};
pub use roles::Role;
