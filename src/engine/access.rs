// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Access decisions.
//!
//! A learner may use a content item when, checked in order:
//!
//! 1. their access record carries an explicit grant
//! 2. the item has requirements and every clause holds for the learner
//! 3. the ledger says so
//!
//! An item without requirements is never opened automatically; it falls
//! through to the ledger like an item whose requirements are unmet.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::locks::{access_key, KeyedLocks};
use super::{EngineError, EngineResult, ExternalStep};
use crate::ledger::{is_content_addressed, AccessLedger, BlobStorage, CollaboratorError, Service};
use crate::models::{
    AccessRequirement, CompletionStatus, ContentFilter, ContentRecord, LearnerProfile,
    UserAccessRecord, VerificationStatus,
};
use crate::storage::{AccessRecordStore, ContentRepository, ProfileStore};

/// Which rule allowed or denied access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccessBasis {
    ExplicitGrant,
    Requirements,
    Ledger,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AccessDecision {
    pub allowed: bool,
    pub basis: AccessBasis,
}

/// A content item opened for a learner.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OpenedContent {
    pub content_id: String,
    /// Where the payload can be fetched.
    pub url: String,
    pub basis: AccessBasis,
    pub record: UserAccessRecord,
}

pub struct AccessControl {
    content: Arc<dyn ContentRepository>,
    records: Arc<dyn AccessRecordStore>,
    profiles: Arc<dyn ProfileStore>,
    ledger: Arc<dyn AccessLedger>,
    blobs: Arc<dyn BlobStorage>,
    locks: Arc<KeyedLocks>,
}

impl AccessControl {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        records: Arc<dyn AccessRecordStore>,
        profiles: Arc<dyn ProfileStore>,
        ledger: Arc<dyn AccessLedger>,
        blobs: Arc<dyn BlobStorage>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            content,
            records,
            profiles,
            ledger,
            blobs,
            locks,
        }
    }

    /// Whether the learner may use the content item.
    pub async fn check_access(&self, user_id: &str, content_id: &str) -> EngineResult<bool> {
        Ok(self.evaluate(user_id, content_id).await?.allowed)
    }

    /// Like [`check_access`](Self::check_access), also naming the deciding rule.
    pub async fn evaluate(&self, user_id: &str, content_id: &str) -> EngineResult<AccessDecision> {
        let content = self.load_content(content_id)?;

        if let Some(record) = self.records.get_access(user_id, content_id)? {
            if record.access_granted {
                return Ok(AccessDecision {
                    allowed: true,
                    basis: AccessBasis::ExplicitGrant,
                });
            }
        }

        if !content.access_requirements.is_empty() && self.requirements_met(user_id, &content)? {
            return Ok(AccessDecision {
                allowed: true,
                basis: AccessBasis::Requirements,
            });
        }

        let allowed = self
            .ledger
            .check_access(user_id, content_id)
            .await
            .map_err(EngineError::external(ExternalStep::LedgerCheck))?;
        debug!(user_id = %user_id, content_id = %content_id, allowed, "Ledger access check");

        Ok(AccessDecision {
            allowed,
            basis: AccessBasis::Ledger,
        })
    }

    /// Record an explicit grant on the ledger, then locally.
    ///
    /// Nothing is written locally unless the ledger accepted the grant.
    pub async fn grant_access(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> EngineResult<UserAccessRecord> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user id must not be blank".into()));
        }
        self.load_content(content_id)?;

        let _guard = self.locks.lock(&access_key(user_id, content_id)).await;

        let granted = self
            .ledger
            .grant_access(user_id, content_id)
            .await
            .map_err(EngineError::external(ExternalStep::LedgerGrant))?;
        if !granted {
            warn!(user_id = %user_id, content_id = %content_id, "Ledger declined grant");
            return Err(EngineError::external(ExternalStep::LedgerGrant)(
                CollaboratorError::permanent(Service::Ledger, "ledger declined the grant"),
            ));
        }

        let mut record = self
            .records
            .get_access(user_id, content_id)?
            .unwrap_or_else(|| UserAccessRecord::new(user_id, content_id));
        record.access_granted = true;
        record.granted_at.get_or_insert_with(Utc::now);
        self.records.put_access(&record)?;

        info!(user_id = %user_id, content_id = %content_id, "Access granted");
        Ok(record)
    }

    /// Check access, stamp the visit and return where to fetch the payload.
    pub async fn open_content(&self, user_id: &str, content_id: &str) -> EngineResult<OpenedContent> {
        let decision = self.evaluate(user_id, content_id).await?;
        if !decision.allowed {
            return Err(EngineError::PreconditionFailed(format!(
                "user {user_id} has no access to content {content_id}"
            )));
        }

        let content = self.load_content(content_id)?;
        let url = if is_content_addressed(&content.payload_location) {
            self.blobs
                .resolve(&content.payload_location)
                .await
                .map_err(EngineError::external(ExternalStep::BlobResolve))?
        } else {
            content.payload_location.clone()
        };

        let record = {
            let _guard = self.locks.lock(&access_key(user_id, content_id)).await;
            let mut record = self
                .records
                .get_access(user_id, content_id)?
                .unwrap_or_else(|| UserAccessRecord::new(user_id, content_id));
            record.last_accessed_at = Some(Utc::now());
            self.records.put_access(&record)?;
            record
        };

        Ok(OpenedContent {
            content_id: content_id.to_string(),
            url,
            basis: decision.basis,
            record,
        })
    }

    fn load_content(&self, content_id: &str) -> EngineResult<ContentRecord> {
        self.content
            .get(content_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Content {content_id}")))
    }

    fn requirements_met(&self, user_id: &str, content: &ContentRecord) -> EngineResult<bool> {
        let profile = self
            .profiles
            .get_profile(user_id)?
            .unwrap_or_else(|| LearnerProfile::empty(user_id));
        let mut standing = ModuleStanding::new(self, user_id);

        for requirement in &content.access_requirements {
            let met = match requirement {
                AccessRequirement::Badge { badge_id } => profile.badges.contains(badge_id),
                AccessRequirement::AgeCohort { cohort } => {
                    profile.age_cohort.as_ref() == Some(cohort)
                }
                AccessRequirement::ModuleCompletion { module_id } => {
                    standing.completed(module_id)?
                }
                AccessRequirement::ModuleProgress {
                    module_id,
                    threshold,
                } => standing.mean_progress(module_id)?.is_some_and(|mean| mean >= f64::from(*threshold)),
            };
            if !met {
                debug!(user_id = %user_id, content_id = %content.id, ?requirement, "Requirement not met");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Lazily loaded view of a learner's records across modules.
struct ModuleStanding<'a> {
    access: &'a AccessControl,
    user_id: &'a str,
    records: Option<HashMap<String, UserAccessRecord>>,
}

impl<'a> ModuleStanding<'a> {
    fn new(access: &'a AccessControl, user_id: &'a str) -> Self {
        Self {
            access,
            user_id,
            records: None,
        }
    }

    /// Published items of a module. Drafts never block a learner.
    fn items(&self, module_id: &str) -> EngineResult<Vec<ContentRecord>> {
        Ok(self.access.content.list(&ContentFilter {
            module_id: Some(module_id.to_string()),
            status: Some(VerificationStatus::Published),
            ..Default::default()
        })?)
    }

    fn records(&mut self) -> EngineResult<&HashMap<String, UserAccessRecord>> {
        if self.records.is_none() {
            let loaded = self
                .access
                .records
                .list_access_for_user(self.user_id)?
                .into_iter()
                .map(|r| (r.content_id.clone(), r))
                .collect();
            self.records = Some(loaded);
        }
        Ok(self.records.get_or_insert_with(HashMap::new))
    }

    fn completed(&mut self, module_id: &str) -> EngineResult<bool> {
        let items = self.items(module_id)?;
        if items.is_empty() {
            return Ok(false);
        }
        let records = self.records()?;
        Ok(items.iter().all(|item| {
            records
                .get(&item.id)
                .is_some_and(|r| r.completion_status == CompletionStatus::Completed)
        }))
    }

    /// Mean progress over the module's items, missing records counting as 0.
    fn mean_progress(&mut self, module_id: &str) -> EngineResult<Option<f64>> {
        let items = self.items(module_id)?;
        if items.is_empty() {
            return Ok(None);
        }
        let records = self.records()?;
        let total: u32 = items
            .iter()
            .map(|item| records.get(&item.id).map_or(0, |r| u32::from(r.progress)))
            .sum();
        Ok(Some(f64::from(total) / items.len() as f64))
    }
}
