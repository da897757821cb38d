// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity of the caller behind a request.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;

/// Caller identity as asserted by the upstream gateway.
///
/// The gateway authenticates users and forwards `x-actor-id` and
/// `x-actor-role`; this service trusts those headers and does not verify
/// credentials itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn has_role(&self, required: Role) -> bool {
        self.role.has_privilege(required)
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}
