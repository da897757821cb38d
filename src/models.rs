// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Domain Models
//!
//! Data structures shared by the lifecycle engine, the repositories and the
//! REST API. All types derive `Serialize`, `Deserialize`, and `ToSchema` so
//! the same shapes are persisted, returned over HTTP and documented in the
//! OpenAPI schema.
//!
//! ## Model Categories
//!
//! - **Content**: [`ContentRecord`] and its metadata, requirements and history
//! - **Learner state**: [`UserAccessRecord`], [`LearnerProfile`]
//! - **Feedback**: [`FeedbackRecord`]
//! - **Queries**: [`ContentFilter`]

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Age Cohort Type
// =============================================================================

/// Target audience bracket, e.g. `"8-10"` or `"adult"`.
///
/// Cohorts are compared case-insensitively after trimming, so the wrapper
/// normalises on construction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(from = "String", into = "String")]
pub struct AgeCohort(String);

impl AgeCohort {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgeCohort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgeCohort {
    fn from(value: String) -> Self {
        AgeCohort(value.trim().to_lowercase())
    }
}

impl From<&str> for AgeCohort {
    fn from(value: &str) -> Self {
        AgeCohort::from(value.to_string())
    }
}

impl From<AgeCohort> for String {
    fn from(value: AgeCohort) -> Self {
        value.0
    }
}

// =============================================================================
// Content Metadata
// =============================================================================

/// Kind of educational material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Lesson,
    Video,
    Quiz,
    Simulation,
    Game,
    Activity,
    Certificate,
}

impl ContentKind {
    /// Whether learners are scored on this kind of content.
    pub fn is_assessable(&self) -> bool {
        matches!(self, ContentKind::Quiz | ContentKind::Game)
    }
}

/// Difficulty level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

/// Descriptive metadata of a content item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ContentMetadata {
    pub title: String,
    pub description: String,
    pub kind: ContentKind,
    pub level: DifficultyLevel,
    /// Audiences this item is written for. Never empty.
    #[schema(value_type = Vec<String>)]
    pub age_cohorts: BTreeSet<AgeCohort>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    /// Estimated time to complete, in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Access Requirements
// =============================================================================

/// A prerequisite clause gating a content item.
///
/// A record's clauses are combined with AND semantics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccessRequirement {
    /// Learner must hold the badge.
    Badge { badge_id: String },
    /// Learner must have completed every item of the module.
    ModuleCompletion { module_id: String },
    /// Learner's mean progress across the module must reach `threshold` (0-100).
    ModuleProgress { module_id: String, threshold: u8 },
    /// Learner must belong to the cohort.
    AgeCohort {
        #[schema(value_type = String)]
        cohort: AgeCohort,
    },
}

// =============================================================================
// Verification
// =============================================================================

/// Lifecycle state of a content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Draft,
    PendingReview,
    ChangesRequested,
    Verified,
    /// Withdrawn outright. Terminal; resubmission requires new content.
    Rejected,
    Published,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VerificationStatus::Draft => "draft",
            VerificationStatus::PendingReview => "pending_review",
            VerificationStatus::ChangesRequested => "changes_requested",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
            VerificationStatus::Published => "published",
        };
        write!(f, "{name}")
    }
}

/// Immutable entry of a record's verification history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerificationDecision {
    /// Reviewer, or the actor whose action caused the transition.
    pub reviewer_id: String,
    /// Status the record moved into.
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub decided_at: DateTime<Utc>,
    /// Hex SHA-256 over reviewer, content, status and time. Tamper-evidence
    /// only; this is not a signature.
    pub fingerprint: String,
}

/// Receipt returned by the ledger when a record was published.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LedgerRecord {
    pub transaction_ref: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

// =============================================================================
// Content Record
// =============================================================================

/// The unit of educational material and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ContentRecord {
    pub id: String,
    pub metadata: ContentMetadata,
    pub payload_location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_location: Option<String>,
    #[serde(default)]
    pub access_requirements: Vec<AccessRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<String>,
    #[serde(default)]
    pub order_within_module: u32,
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub verification_history: Vec<VerificationDecision>,
    /// Present exactly while the record is `Published`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_record: Option<LedgerRecord>,
    /// Receipts of earlier publications that were later edited.
    #[serde(default)]
    pub superseded_ledger_records: Vec<LedgerRecord>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency counter, bumped on every persisted write.
    #[serde(default)]
    pub version: u64,
}

/// Input for creating a content record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewContent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub kind: ContentKind,
    pub level: DifficultyLevel,
    #[schema(value_type = Vec<String>)]
    pub age_cohorts: BTreeSet<AgeCohort>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub objectives: Vec<String>,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    pub payload_location: String,
    #[serde(default)]
    pub thumbnail_location: Option<String>,
    #[serde(default)]
    pub access_requirements: Vec<AccessRequirement>,
    #[serde(default)]
    pub module_id: Option<String>,
    #[serde(default)]
    pub order_within_module: u32,
}

/// Partial update of a content record. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ContentUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<ContentKind>,
    pub level: Option<DifficultyLevel>,
    #[schema(value_type = Option<Vec<String>>)]
    pub age_cohorts: Option<BTreeSet<AgeCohort>>,
    pub keywords: Option<Vec<String>>,
    pub objectives: Option<Vec<String>>,
    pub estimated_minutes: Option<u32>,
    pub payload_location: Option<String>,
    pub thumbnail_location: Option<String>,
    pub access_requirements: Option<Vec<AccessRequirement>>,
    pub module_id: Option<String>,
    pub order_within_module: Option<u32>,
}

/// Typed listing filter. Every present field must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ContentFilter {
    pub kind: Option<ContentKind>,
    pub level: Option<DifficultyLevel>,
    #[schema(value_type = Option<String>)]
    pub age_cohort: Option<AgeCohort>,
    pub module_id: Option<String>,
    pub status: Option<VerificationStatus>,
}

impl ContentFilter {
    pub fn matches(&self, record: &ContentRecord) -> bool {
        self.kind.map_or(true, |kind| record.metadata.kind == kind)
            && self.level.map_or(true, |level| record.metadata.level == level)
            && self
                .age_cohort
                .as_ref()
                .map_or(true, |cohort| record.metadata.age_cohorts.contains(cohort))
            && self
                .module_id
                .as_ref()
                .map_or(true, |module| record.module_id.as_ref() == Some(module))
            && self
                .status
                .map_or(true, |status| record.verification_status == status)
    }
}

// =============================================================================
// Learner State
// =============================================================================

/// Completion state of one learner on one content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl Default for CompletionStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// Per-(user, content) access and progress state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct UserAccessRecord {
    pub user_id: String,
    pub content_id: String,
    /// Explicit grant, independent of requirement evaluation.
    pub access_granted: bool,
    pub completion_status: CompletionStatus,
    /// Always within 0..=100. Not monotonic: re-attempts may lower it.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    /// First time the record reached `Completed`. Kept when the status
    /// later drops back, so the ledger hears about completion once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// A report ever carried an explicit completion flag.
    #[serde(default)]
    pub explicitly_completed: bool,
    /// Intent time of the last accepted progress report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_reported_at: Option<DateTime<Utc>>,
}

impl UserAccessRecord {
    /// Fresh record with no grant and no progress.
    pub fn new(user_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            content_id: content_id.into(),
            access_granted: false,
            completion_status: CompletionStatus::NotStarted,
            progress: 0,
            score: None,
            attempts: None,
            granted_at: None,
            last_accessed_at: None,
            completed_at: None,
            explicitly_completed: false,
            progress_reported_at: None,
        }
    }
}

/// Badges and cohort of a learner, read by requirement evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct LearnerProfile {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub age_cohort: Option<AgeCohort>,
    #[serde(default)]
    pub badges: BTreeSet<String>,
    pub updated_at: DateTime<Utc>,
}

impl LearnerProfile {
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            age_cohort: None,
            badges: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }
}

// =============================================================================
// Feedback
// =============================================================================

/// Append-only rating/comment on a content item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub content_id: String,
    pub user_id: String,
    /// Always within 1..=5.
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate rating of a content item.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct FeedbackSummary {
    pub content_id: String,
    pub count: usize,
    /// Mean rating, absent when no feedback exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(kind: ContentKind, module: Option<&str>, cohorts: &[&str]) -> ContentRecord {
        let now = Utc::now();
        ContentRecord {
            id: "c-1".to_string(),
            metadata: ContentMetadata {
                title: "Fractions".to_string(),
                description: String::new(),
                kind,
                level: DifficultyLevel::Beginner,
                age_cohorts: cohorts.iter().map(|c| AgeCohort::from(*c)).collect(),
                keywords: vec![],
                objectives: vec![],
                estimated_minutes: None,
                created_at: now,
                updated_at: now,
            },
            payload_location: "https://cdn.example/fractions.html".to_string(),
            thumbnail_location: None,
            access_requirements: vec![],
            module_id: module.map(str::to_string),
            order_within_module: 0,
            verification_status: VerificationStatus::Draft,
            verification_history: vec![],
            ledger_record: None,
            superseded_ledger_records: vec![],
            creator_id: "creator".to_string(),
            created_at: now,
            updated_at: now,
            published_at: None,
            version: 0,
        }
    }

    #[test]
    fn age_cohort_normalises_case_and_whitespace() {
        assert_eq!(AgeCohort::from("  8-10 "), AgeCohort::from("8-10"));
        assert_eq!(AgeCohort::from("Adult").as_str(), "adult");
    }

    #[test]
    fn age_cohort_deserializes_normalised() {
        let cohort: AgeCohort = serde_json::from_str("\" Teens \"").unwrap();
        assert_eq!(cohort.as_str(), "teens");
    }

    #[test]
    fn empty_filter_matches_everything() {
        let record = record_with(ContentKind::Lesson, None, &["8-10"]);
        assert!(ContentFilter::default().matches(&record));
    }

    #[test]
    fn filter_fields_are_and_combined() {
        let record = record_with(ContentKind::Quiz, Some("math-1"), &["8-10", "11-13"]);

        let hit = ContentFilter {
            kind: Some(ContentKind::Quiz),
            module_id: Some("math-1".to_string()),
            age_cohort: Some(AgeCohort::from("11-13")),
            ..Default::default()
        };
        assert!(hit.matches(&record));

        let miss = ContentFilter {
            kind: Some(ContentKind::Quiz),
            module_id: Some("math-2".to_string()),
            ..Default::default()
        };
        assert!(!miss.matches(&record));

        let wrong_status = ContentFilter {
            status: Some(VerificationStatus::Published),
            ..Default::default()
        };
        assert!(!wrong_status.matches(&record));
    }

    #[test]
    fn requirement_serializes_with_type_tag() {
        let clause = AccessRequirement::ModuleProgress {
            module_id: "m-1".to_string(),
            threshold: 60,
        };
        let json = serde_json::to_value(&clause).unwrap();
        assert_eq!(json["type"], "module_progress");
        assert_eq!(json["threshold"], 60);
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(VerificationStatus::PendingReview.to_string(), "pending_review");
        assert_eq!(VerificationStatus::Published.to_string(), "published");
    }
}
