// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Learner badges and cohort, the inputs of requirement evaluation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::{EngineError, EngineResult};
use crate::models::{AgeCohort, LearnerProfile};
use crate::storage::ProfileStore;

pub struct LearnerProfiles {
    store: Arc<dyn ProfileStore>,
    // Badge awards read-modify-write the profile.
    writes: std::sync::Mutex<()>,
}

impl LearnerProfiles {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self {
            store,
            writes: std::sync::Mutex::new(()),
        }
    }

    /// Stored profile, or an empty one for unknown learners.
    pub fn get_profile(&self, user_id: &str) -> EngineResult<LearnerProfile> {
        Ok(self
            .store
            .get_profile(user_id)?
            .unwrap_or_else(|| LearnerProfile::empty(user_id)))
    }

    /// Replace the profile.
    pub fn set_profile(
        &self,
        user_id: &str,
        age_cohort: Option<AgeCohort>,
        badges: BTreeSet<String>,
    ) -> EngineResult<LearnerProfile> {
        require_user(user_id)?;
        let badges = clean_badges(badges)?;
        let profile = LearnerProfile {
            user_id: user_id.to_string(),
            age_cohort: age_cohort.filter(|c| !c.as_str().is_empty()),
            badges,
            updated_at: Utc::now(),
        };

        let _guard = self.writes.lock().unwrap_or_else(|p| p.into_inner());
        self.store.put_profile(&profile)?;
        info!(user_id = %user_id, "Learner profile replaced");
        Ok(profile)
    }

    /// Add one badge, creating the profile if needed.
    pub fn award_badge(&self, user_id: &str, badge_id: &str) -> EngineResult<LearnerProfile> {
        require_user(user_id)?;
        let badge_id = badge_id.trim();
        if badge_id.is_empty() {
            return Err(EngineError::Validation("badge id must not be blank".into()));
        }

        let _guard = self.writes.lock().unwrap_or_else(|p| p.into_inner());
        let mut profile = self.get_profile(user_id)?;
        if profile.badges.insert(badge_id.to_string()) {
            profile.updated_at = Utc::now();
            self.store.put_profile(&profile)?;
            info!(user_id = %user_id, badge_id = %badge_id, "Badge awarded");
        }
        Ok(profile)
    }
}

fn require_user(user_id: &str) -> EngineResult<()> {
    if user_id.trim().is_empty() {
        return Err(EngineError::Validation("user id must not be blank".into()));
    }
    Ok(())
}

fn clean_badges(badges: BTreeSet<String>) -> EngineResult<BTreeSet<String>> {
    let cleaned: BTreeSet<String> = badges.iter().map(|b| b.trim().to_string()).collect();
    if cleaned.contains("") {
        return Err(EngineError::Validation("badge ids must not be blank".into()));
    }
    Ok(cleaned)
}
