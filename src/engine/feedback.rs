// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Append-only learner feedback.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{EngineError, EngineResult};
use crate::models::{FeedbackRecord, FeedbackSummary};
use crate::storage::{ContentRepository, FeedbackStore};

pub const MAX_FEEDBACK_COMMENT_CHARS: usize = 2000;

pub struct FeedbackLedger {
    content: Arc<dyn ContentRepository>,
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackLedger {
    pub fn new(content: Arc<dyn ContentRepository>, store: Arc<dyn FeedbackStore>) -> Self {
        Self { content, store }
    }

    /// Append a rating. Ratings are clamped to 1..=5.
    pub fn add_feedback(
        &self,
        user_id: &str,
        content_id: &str,
        rating: i64,
        comment: Option<String>,
    ) -> EngineResult<FeedbackRecord> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("user id must not be blank".into()));
        }
        self.ensure_content(content_id)?;

        let comment = match comment.as_deref().map(str::trim) {
            Some(text) if text.chars().count() > MAX_FEEDBACK_COMMENT_CHARS => {
                return Err(EngineError::Validation(format!(
                    "comment exceeds {MAX_FEEDBACK_COMMENT_CHARS} characters"
                )));
            }
            Some(text) if !text.is_empty() => Some(text.to_string()),
            _ => None,
        };

        let record = FeedbackRecord {
            content_id: content_id.to_string(),
            user_id: user_id.to_string(),
            rating: rating.clamp(1, 5) as u8,
            comment,
            created_at: Utc::now(),
        };
        self.store.append_feedback(&record)?;

        info!(content_id = %content_id, user_id = %user_id, rating = record.rating, "Feedback added");
        Ok(record)
    }

    /// All feedback for a content item, oldest first.
    pub fn list_feedback(&self, content_id: &str) -> EngineResult<Vec<FeedbackRecord>> {
        self.ensure_content(content_id)?;
        Ok(self.store.list_feedback(content_id)?)
    }

    pub fn feedback_summary(&self, content_id: &str) -> EngineResult<FeedbackSummary> {
        let feedback = self.list_feedback(content_id)?;
        let count = feedback.len();
        let average_rating = (count > 0).then(|| {
            let total: u32 = feedback.iter().map(|f| u32::from(f.rating)).sum();
            f64::from(total) / count as f64
        });
        Ok(FeedbackSummary {
            content_id: content_id.to_string(),
            count,
            average_rating,
        })
    }

    fn ensure_content(&self, content_id: &str) -> EngineResult<()> {
        match self.content.get(content_id)? {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(format!("Content {content_id}"))),
        }
    }
}
