// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Actor roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Actor roles for authorization.
///
/// ## Role Hierarchy
///
/// - `Admin` - Everything, including grants and profile management
/// - `Reviewer` - Review decisions, rejection and publishing
/// - `Creator` - Authoring: create, edit and submit content
/// - `Learner` - Reads published content, reports progress and feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Reviewer,
    Creator,
    Learner,
}

impl Role {
    /// Check if this role has at least the privileges of the required role.
    pub fn has_privilege(&self, required: Role) -> bool {
        match (self, required) {
            (Role::Admin, _) => true,
            (Role::Reviewer, Role::Reviewer | Role::Learner) => true,
            (Role::Creator, Role::Creator | Role::Learner) => true,
            (Role::Learner, Role::Learner) => true,
            _ => false,
        }
    }

    /// Staff see content in every lifecycle state.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Learner)
    }

    /// Parse role from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "reviewer" => Some(Role::Reviewer),
            "creator" => Some(Role::Creator),
            "learner" => Some(Role::Learner),
            _ => None,
        }
    }
}

impl Default for Role {
    /// Least privilege for identified actors.
    fn default() -> Self {
        Role::Learner
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Reviewer => write!(f, "reviewer"),
            Role::Creator => write!(f, "creator"),
            Role::Learner => write!(f, "learner"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_has_all_privileges() {
        for role in [Role::Admin, Role::Reviewer, Role::Creator, Role::Learner] {
            assert!(Role::Admin.has_privilege(role));
        }
    }

    #[test]
    fn reviewers_and_creators_are_separate() {
        assert!(Role::Reviewer.has_privilege(Role::Reviewer));
        assert!(!Role::Reviewer.has_privilege(Role::Creator));
        assert!(Role::Creator.has_privilege(Role::Creator));
        assert!(!Role::Creator.has_privilege(Role::Reviewer));
        assert!(!Role::Learner.has_privilege(Role::Creator));
    }

    #[test]
    fn from_str_parses_correctly() {
        assert_eq!(Role::from_str("admin"), Some(Role::Admin));
        assert_eq!(Role::from_str(" REVIEWER "), Some(Role::Reviewer));
        assert_eq!(Role::from_str("Creator"), Some(Role::Creator));
        assert_eq!(Role::from_str("client"), None);
    }

    #[test]
    fn default_role_is_learner() {
        assert_eq!(Role::default(), Role::Learner);
        assert!(!Role::default().is_staff());
    }
}
