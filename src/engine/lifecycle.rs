// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Verification state machine.
//!
//! ```text
//!   Draft ──submit──▶ PendingReview ──approve──▶ Verified ──publish──▶ Published
//!                      ▲        │                   │                    │
//!                      │   request changes          └──── edit ──────────┤
//!                      │        ▼                                        │
//!                      └── ChangesRequested ◀───────────── (edit resets to PendingReview)
//!
//!   any state except Published/Rejected ──reject──▶ Rejected (terminal)
//! ```
//!
//! Every status change appends a [`VerificationDecision`] naming the actor.
//! `ledger_record` is set exactly while a record is `Published`.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::locks::KeyedLocks;
use super::{EngineError, EngineResult, ExternalStep};
use crate::ledger::{is_content_addressed, AccessLedger, BlobPayload, BlobStorage, LedgerMetadata};
use crate::models::{
    AccessRequirement, ContentFilter, ContentMetadata, ContentRecord, ContentUpdate, NewContent,
    VerificationDecision, VerificationStatus,
};
use crate::storage::ContentRepository;

/// Upper bound on reviewer comments.
const MAX_COMMENT_CHARS: usize = 4000;

/// Actions that may move a record between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Submit,
    Approve,
    RequestChanges,
    Reject,
    Publish,
    Edit,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Submit => "submit",
            LifecycleAction::Approve => "approve",
            LifecycleAction::RequestChanges => "request changes on",
            LifecycleAction::Reject => "reject",
            LifecycleAction::Publish => "publish",
            LifecycleAction::Edit => "edit",
        }
    }
}

/// Target state of `action` from `from`, or `None` if the edge does not exist.
pub fn next_status(from: VerificationStatus, action: LifecycleAction) -> Option<VerificationStatus> {
    use self::LifecycleAction as A;
    use crate::models::VerificationStatus as S;

    match (from, action) {
        (S::Draft | S::ChangesRequested, A::Submit) => Some(S::PendingReview),
        (S::PendingReview, A::Approve) => Some(S::Verified),
        (S::PendingReview, A::RequestChanges) => Some(S::ChangesRequested),
        (S::Verified, A::Publish) => Some(S::Published),
        (S::Draft | S::PendingReview | S::ChangesRequested, A::Edit) => Some(from),
        (S::Verified | S::Published, A::Edit) => Some(S::PendingReview),
        (S::Published | S::Rejected, A::Reject) => None,
        (_, A::Reject) => Some(S::Rejected),
        _ => None,
    }
}

/// Hex SHA-256 over the fields that identify a decision.
pub fn decision_fingerprint(
    reviewer_id: &str,
    content_id: &str,
    status: VerificationStatus,
    decided_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reviewer_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(content_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(status.to_string().as_bytes());
    hasher.update([0x1f]);
    hasher.update(decided_at.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct ContentLifecycle {
    repo: Arc<dyn ContentRepository>,
    ledger: Arc<dyn AccessLedger>,
    blobs: Arc<dyn BlobStorage>,
    locks: KeyedLocks,
}

impl ContentLifecycle {
    pub fn new(
        repo: Arc<dyn ContentRepository>,
        ledger: Arc<dyn AccessLedger>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            repo,
            ledger,
            blobs,
            locks: KeyedLocks::new(),
        }
    }

    /// Create a record in `Draft` with an empty history.
    pub fn create(&self, input: NewContent, creator_id: &str) -> EngineResult<ContentRecord> {
        require_actor(creator_id)?;
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(EngineError::Validation("title must not be blank".into()));
        }
        let payload_location = input.payload_location.trim().to_string();
        if payload_location.is_empty() {
            return Err(EngineError::Validation(
                "payload_location must not be blank".into(),
            ));
        }
        if input.age_cohorts.is_empty() {
            return Err(EngineError::Validation(
                "at least one age cohort is required".into(),
            ));
        }
        validate_requirements(&input.access_requirements)?;

        let now = Utc::now();
        let record = ContentRecord {
            id: Uuid::new_v4().to_string(),
            metadata: ContentMetadata {
                title,
                description: input.description,
                kind: input.kind,
                level: input.level,
                age_cohorts: input.age_cohorts,
                keywords: input.keywords,
                objectives: input.objectives,
                estimated_minutes: input.estimated_minutes,
                created_at: now,
                updated_at: now,
            },
            payload_location,
            thumbnail_location: input.thumbnail_location,
            access_requirements: input.access_requirements,
            module_id: input.module_id,
            order_within_module: input.order_within_module,
            verification_status: VerificationStatus::Draft,
            verification_history: Vec::new(),
            ledger_record: None,
            superseded_ledger_records: Vec::new(),
            creator_id: creator_id.to_string(),
            created_at: now,
            updated_at: now,
            published_at: None,
            version: 0,
        };

        self.repo.insert(&record)?;
        info!(content_id = %record.id, creator_id = %creator_id, "Content created");
        Ok(record)
    }

    pub fn get(&self, id: &str) -> EngineResult<ContentRecord> {
        self.repo
            .get(id)?
            .ok_or_else(|| EngineError::NotFound(format!("Content {id}")))
    }

    pub fn list(&self, filter: &ContentFilter) -> EngineResult<Vec<ContentRecord>> {
        Ok(self.repo.list(filter)?)
    }

    /// Single-key read used by readiness checks.
    pub fn check_storage(&self) -> EngineResult<()> {
        self.repo.get("")?;
        Ok(())
    }

    /// `Draft | ChangesRequested -> PendingReview`.
    pub async fn submit_for_review(&self, id: &str, actor_id: &str) -> EngineResult<ContentRecord> {
        require_actor(actor_id)?;
        self.transition(id, actor_id, LifecycleAction::Submit, None)
            .await
    }

    /// `PendingReview -> Verified` when approved, else `-> ChangesRequested`.
    pub async fn record_decision(
        &self,
        id: &str,
        reviewer_id: &str,
        approved: bool,
        comments: Option<String>,
    ) -> EngineResult<ContentRecord> {
        require_actor(reviewer_id)?;
        let comments = normalize_comments(comments)?;
        let action = if approved {
            LifecycleAction::Approve
        } else {
            LifecycleAction::RequestChanges
        };
        self.transition(id, reviewer_id, action, comments).await
    }

    /// Withdraw a record for good. Comments are mandatory.
    pub async fn reject(
        &self,
        id: &str,
        reviewer_id: &str,
        comments: String,
    ) -> EngineResult<ContentRecord> {
        require_actor(reviewer_id)?;
        let comments = normalize_comments(Some(comments))?.ok_or_else(|| {
            EngineError::Validation("rejection requires non-blank comments".into())
        })?;
        self.transition(id, reviewer_id, LifecycleAction::Reject, Some(comments))
            .await
    }

    /// Apply a partial update. Signed-off records go back to review.
    pub async fn edit(
        &self,
        id: &str,
        editor_id: &str,
        updates: ContentUpdate,
    ) -> EngineResult<ContentRecord> {
        require_actor(editor_id)?;
        let _guard = self.locks.lock(id).await;
        let mut record = self.load(id)?;
        let from = record.verification_status;
        let to = next_status(from, LifecycleAction::Edit).ok_or(EngineError::InvalidTransition {
            from,
            action: LifecycleAction::Edit.as_str(),
        })?;

        apply_update(&mut record, updates)?;

        let now = Utc::now();
        record.metadata.updated_at = now;
        record.updated_at = now;

        if to != from {
            if let Some(receipt) = record.ledger_record.take() {
                record.superseded_ledger_records.push(receipt);
            }
            record.published_at = None;
            record.verification_status = to;
            append_decision(
                &mut record,
                editor_id,
                to,
                Some(format!("edited while {from}")),
                now,
            );
            info!(content_id = %id, editor_id = %editor_id, from = %from, "Edit reset content to review");
        }

        Ok(self.repo.update(&record)?)
    }

    /// Upload, anchor and publish a `Verified` record.
    ///
    /// The record is only written after both the payload upload and the
    /// ledger write succeed; on failure it is left exactly as it was.
    pub async fn publish(&self, id: &str, publisher_id: &str) -> EngineResult<ContentRecord> {
        require_actor(publisher_id)?;
        let _guard = self.locks.lock(id).await;
        let record = self.load(id)?;
        if record.verification_status != VerificationStatus::Verified {
            return Err(EngineError::PreconditionFailed(format!(
                "content {id} is {}; only verified content can be published",
                record.verification_status
            )));
        }

        let payload_address = if is_content_addressed(&record.payload_location) {
            record.payload_location.clone()
        } else {
            let payload = BlobPayload {
                content_id: record.id.clone(),
                source_location: record.payload_location.clone(),
            };
            self.blobs.upload(&payload).await.map_err(|e| {
                warn!(content_id = %id, error = %e, "Payload upload failed");
                EngineError::external(ExternalStep::BlobUpload)(e)
            })?
        };

        match self.blobs.pin(&payload_address).await {
            Ok(true) => {}
            Ok(false) => warn!(content_id = %id, address = %payload_address, "Blob storage declined pin"),
            Err(e) => warn!(content_id = %id, address = %payload_address, error = %e, "Pinning failed"),
        }

        let metadata = LedgerMetadata::from_record(&record, &payload_address);
        let receipt = self
            .ledger
            .store_metadata(&record.id, &metadata)
            .await
            .map_err(|e| {
                warn!(content_id = %id, error = %e, "Ledger metadata write failed");
                EngineError::external(ExternalStep::LedgerWrite)(e)
            })?;

        let now = Utc::now();
        let transaction_ref = receipt.transaction_ref.clone();
        let mut next = record;
        next.payload_location = payload_address;
        next.ledger_record = Some(receipt.into());
        next.published_at = Some(now);
        next.updated_at = now;
        next.verification_status = VerificationStatus::Published;
        append_decision(&mut next, publisher_id, VerificationStatus::Published, None, now);

        match self.repo.update(&next) {
            Ok(saved) => {
                info!(content_id = %id, transaction_ref = %transaction_ref, "Content published");
                Ok(saved)
            }
            Err(e) => {
                // The ledger already holds the metadata; the receipt is only
                // recoverable from this log line.
                error!(content_id = %id, transaction_ref = %transaction_ref, error = %e, "Published on ledger but local write failed");
                Err(e.into())
            }
        }
    }

    async fn transition(
        &self,
        id: &str,
        actor_id: &str,
        action: LifecycleAction,
        comments: Option<String>,
    ) -> EngineResult<ContentRecord> {
        let _guard = self.locks.lock(id).await;
        let mut record = self.load(id)?;
        let from = record.verification_status;
        let to = next_status(from, action).ok_or(EngineError::InvalidTransition {
            from,
            action: action.as_str(),
        })?;

        let now = Utc::now();
        record.verification_status = to;
        record.updated_at = now;
        append_decision(&mut record, actor_id, to, comments, now);

        let saved = self.repo.update(&record)?;
        info!(content_id = %id, actor_id = %actor_id, from = %from, to = %to, "Content status changed");
        Ok(saved)
    }

    fn load(&self, id: &str) -> EngineResult<ContentRecord> {
        self.get(id)
    }
}

fn require_actor(actor_id: &str) -> EngineResult<()> {
    if actor_id.trim().is_empty() {
        return Err(EngineError::Validation("actor id must not be blank".into()));
    }
    Ok(())
}

fn normalize_comments(comments: Option<String>) -> EngineResult<Option<String>> {
    let Some(comments) = comments else {
        return Ok(None);
    };
    let trimmed = comments.trim();
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(EngineError::Validation(format!(
            "comments exceed {MAX_COMMENT_CHARS} characters"
        )));
    }
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

fn validate_requirements(requirements: &[AccessRequirement]) -> EngineResult<()> {
    for requirement in requirements {
        match requirement {
            AccessRequirement::Badge { badge_id } if badge_id.trim().is_empty() => {
                return Err(EngineError::Validation("badge requirement needs a badge_id".into()));
            }
            AccessRequirement::ModuleCompletion { module_id }
            | AccessRequirement::ModuleProgress { module_id, .. }
                if module_id.trim().is_empty() =>
            {
                return Err(EngineError::Validation(
                    "module requirement needs a module_id".into(),
                ));
            }
            AccessRequirement::ModuleProgress { threshold, .. } if *threshold > 100 => {
                return Err(EngineError::Validation(format!(
                    "module progress threshold {threshold} exceeds 100"
                )));
            }
            AccessRequirement::AgeCohort { cohort } if cohort.as_str().is_empty() => {
                return Err(EngineError::Validation("cohort requirement needs a cohort".into()));
            }
            _ => {}
        }
    }
    Ok(())
}

fn apply_update(record: &mut ContentRecord, updates: ContentUpdate) -> EngineResult<()> {
    if let Some(title) = updates.title {
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(EngineError::Validation("title must not be blank".into()));
        }
        record.metadata.title = title;
    }
    if let Some(location) = updates.payload_location {
        let location = location.trim().to_string();
        if location.is_empty() {
            return Err(EngineError::Validation(
                "payload_location must not be blank".into(),
            ));
        }
        record.payload_location = location;
    }
    if let Some(cohorts) = updates.age_cohorts {
        if cohorts.is_empty() {
            return Err(EngineError::Validation(
                "at least one age cohort is required".into(),
            ));
        }
        record.metadata.age_cohorts = cohorts;
    }
    if let Some(requirements) = updates.access_requirements {
        validate_requirements(&requirements)?;
        record.access_requirements = requirements;
    }
    if let Some(description) = updates.description {
        record.metadata.description = description;
    }
    if let Some(kind) = updates.kind {
        record.metadata.kind = kind;
    }
    if let Some(level) = updates.level {
        record.metadata.level = level;
    }
    if let Some(keywords) = updates.keywords {
        record.metadata.keywords = keywords;
    }
    if let Some(objectives) = updates.objectives {
        record.metadata.objectives = objectives;
    }
    if let Some(minutes) = updates.estimated_minutes {
        record.metadata.estimated_minutes = Some(minutes);
    }
    if let Some(thumbnail) = updates.thumbnail_location {
        record.thumbnail_location = Some(thumbnail);
    }
    if let Some(module_id) = updates.module_id {
        record.module_id = Some(module_id);
    }
    if let Some(order) = updates.order_within_module {
        record.order_within_module = order;
    }
    Ok(())
}

fn append_decision(
    record: &mut ContentRecord,
    actor_id: &str,
    status: VerificationStatus,
    comments: Option<String>,
    at: DateTime<Utc>,
) {
    let fingerprint = decision_fingerprint(actor_id, &record.id, status, at);
    record.verification_history.push(VerificationDecision {
        reviewer_id: actor_id.to_string(),
        status,
        comments,
        decided_at: at,
        fingerprint,
    });
}
