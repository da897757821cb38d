// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Learner progress.
//!
//! Reports for one (user, content) pair are applied one at a time. Each
//! report carries the time it was issued; a report older than the last one
//! applied is discarded instead of overwriting newer progress.
//!
//! A record is `Completed` exactly while its progress is 100 or some report
//! carried an explicit completion flag. Without a flag, a re-attempt that
//! lowers progress moves it back to `InProgress`. `completed_at` marks the
//! first completion and is never cleared, so the ledger is told once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::locks::{access_key, KeyedLocks};
use super::{EngineError, EngineResult};
use crate::ledger::{AccessLedger, FailureKind};
use crate::models::{CompletionStatus, ContentRecord, UserAccessRecord};
use crate::storage::{AccessRecordStore, ContentRepository};

/// One progress report from a learner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressReport {
    /// Percentage; values outside 0..=100 are clamped.
    pub progress: i64,
    pub completed: bool,
    /// Only accepted on assessable content.
    pub score: Option<u32>,
}

/// What happened to the ledger completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CompletionRecording {
    /// The report did not newly complete the item.
    NotAttempted,
    Recorded,
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProgressOutcome {
    pub record: UserAccessRecord,
    /// The report was older than the stored one and was discarded.
    pub stale: bool,
    pub newly_completed: bool,
    pub completion: CompletionRecording,
}

pub struct ProgressTracker {
    content: Arc<dyn ContentRepository>,
    records: Arc<dyn AccessRecordStore>,
    ledger: Arc<dyn AccessLedger>,
    locks: Arc<KeyedLocks>,
}

impl ProgressTracker {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        records: Arc<dyn AccessRecordStore>,
        ledger: Arc<dyn AccessLedger>,
        locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            content,
            records,
            ledger,
            locks,
        }
    }

    /// Apply a report issued now.
    pub async fn update_progress(
        &self,
        user_id: &str,
        content_id: &str,
        progress: i64,
        completed: bool,
    ) -> EngineResult<ProgressOutcome> {
        let intent_at = Utc::now();
        self.update_progress_at(
            user_id,
            content_id,
            ProgressReport {
                progress,
                completed,
                score: None,
            },
            intent_at,
        )
        .await
    }

    /// Apply a report issued at `intent_at`.
    pub async fn update_progress_at(
        &self,
        user_id: &str,
        content_id: &str,
        report: ProgressReport,
        intent_at: DateTime<Utc>,
    ) -> EngineResult<ProgressOutcome> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user id must not be blank".into()));
        }
        let content = self.load_content(content_id)?;
        if report.score.is_some() && !content.metadata.kind.is_assessable() {
            return Err(EngineError::Validation(format!(
                "content {content_id} is not scored"
            )));
        }

        let _guard = self.locks.lock(&access_key(user_id, content_id)).await;

        let now = Utc::now();
        let mut record = match self.records.get_access(user_id, content_id)? {
            Some(record) => record,
            None => {
                let mut record = UserAccessRecord::new(user_id, content_id);
                record.access_granted = true;
                record.granted_at = Some(now);
                record
            }
        };

        if record.progress_reported_at.is_some_and(|last| intent_at < last) {
            debug!(user_id = %user_id, content_id = %content_id, "Discarding stale progress report");
            return Ok(ProgressOutcome {
                record,
                stale: true,
                newly_completed: false,
                completion: CompletionRecording::NotAttempted,
            });
        }

        let progress = report.progress.clamp(0, 100) as u8;
        let restarted = record.progress_reported_at.is_some() && progress < record.progress;
        if restarted || report.score.is_some() {
            record.attempts = Some(record.attempts.unwrap_or(0) + 1);
        }
        if let Some(score) = report.score {
            record.score = Some(score);
        }

        record.progress = progress;
        record.progress_reported_at = Some(intent_at);
        record.last_accessed_at = Some(now);

        if report.completed {
            record.explicitly_completed = true;
        }
        let reached = record.explicitly_completed || progress == 100;
        let newly_completed = reached && record.completed_at.is_none();
        record.completion_status = if reached {
            record.completed_at.get_or_insert(now);
            CompletionStatus::Completed
        } else if progress > 0 || record.completion_status == CompletionStatus::Completed {
            CompletionStatus::InProgress
        } else {
            record.completion_status
        };

        self.records.put_access(&record)?;

        let completion = if newly_completed {
            info!(user_id = %user_id, content_id = %content_id, "Content completed");
            self.record_completion(user_id, content_id).await
        } else {
            CompletionRecording::NotAttempted
        };

        Ok(ProgressOutcome {
            record,
            stale: false,
            newly_completed,
            completion,
        })
    }

    pub fn get_progress(&self, user_id: &str, content_id: &str) -> EngineResult<UserAccessRecord> {
        self.records
            .get_access(user_id, content_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Progress of {user_id} on {content_id}")))
    }

    pub fn list_progress(&self, user_id: &str) -> EngineResult<Vec<UserAccessRecord>> {
        Ok(self.records.list_access_for_user(user_id)?)
    }

    /// Failures are reported, never propagated: the local write stands.
    async fn record_completion(&self, user_id: &str, content_id: &str) -> CompletionRecording {
        match self.ledger.record_completion(user_id, content_id).await {
            Ok(true) => CompletionRecording::Recorded,
            Ok(false) => {
                warn!(user_id = %user_id, content_id = %content_id, "Ledger declined completion");
                CompletionRecording::Failed {
                    kind: FailureKind::Permanent,
                    message: "ledger declined the completion".to_string(),
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, content_id = %content_id, error = %e, "Completion not recorded on ledger");
                CompletionRecording::Failed {
                    kind: e.kind,
                    message: e.message,
                }
            }
        }
    }

    fn load_content(&self, content_id: &str) -> EngineResult<ContentRecord> {
        self.content
            .get(content_id)?
            .ok_or_else(|| EngineError::NotFound(format!("Content {content_id}")))
    }
}
