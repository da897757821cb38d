// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory implementation of every repository trait.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::models::{
    ContentFilter, ContentRecord, FeedbackRecord, LearnerProfile, UserAccessRecord,
};

use super::{
    sort_for_listing, AccessRecordStore, ContentRepository, FeedbackStore, ProfileStore,
    StorageError, StorageResult,
};

#[derive(Default)]
pub struct InMemoryStore {
    content: RwLock<HashMap<String, ContentRecord>>,
    access: RwLock<HashMap<(String, String), UserAccessRecord>>,
    feedback: RwLock<HashMap<String, Vec<FeedbackRecord>>>,
    profiles: RwLock<HashMap<String, LearnerProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentRepository for InMemoryStore {
    fn insert(&self, record: &ContentRecord) -> StorageResult<()> {
        let mut content = self.content.write().map_err(|_| StorageError::Poisoned)?;
        if content.contains_key(&record.id) {
            return Err(StorageError::AlreadyExists(format!("Content {}", record.id)));
        }
        content.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> StorageResult<Option<ContentRecord>> {
        let content = self.content.read().map_err(|_| StorageError::Poisoned)?;
        Ok(content.get(id).cloned())
    }

    fn update(&self, record: &ContentRecord) -> StorageResult<ContentRecord> {
        let mut content = self.content.write().map_err(|_| StorageError::Poisoned)?;
        let stored = content
            .get_mut(&record.id)
            .ok_or_else(|| StorageError::NotFound(format!("Content {}", record.id)))?;

        if stored.version != record.version {
            return Err(StorageError::Conflict {
                entity: format!("Content {}", record.id),
                expected: record.version,
                found: stored.version,
            });
        }

        let mut next = record.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    fn list(&self, filter: &ContentFilter) -> StorageResult<Vec<ContentRecord>> {
        let content = self.content.read().map_err(|_| StorageError::Poisoned)?;
        let mut records: Vec<ContentRecord> = content
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        sort_for_listing(&mut records);
        Ok(records)
    }
}

impl AccessRecordStore for InMemoryStore {
    fn get_access(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> StorageResult<Option<UserAccessRecord>> {
        let access = self.access.read().map_err(|_| StorageError::Poisoned)?;
        Ok(access
            .get(&(user_id.to_string(), content_id.to_string()))
            .cloned())
    }

    fn put_access(&self, record: &UserAccessRecord) -> StorageResult<()> {
        let mut access = self.access.write().map_err(|_| StorageError::Poisoned)?;
        access.insert(
            (record.user_id.clone(), record.content_id.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn list_access_for_user(&self, user_id: &str) -> StorageResult<Vec<UserAccessRecord>> {
        let access = self.access.read().map_err(|_| StorageError::Poisoned)?;
        let mut records: Vec<UserAccessRecord> = access
            .values()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.content_id.cmp(&b.content_id));
        Ok(records)
    }
}

impl FeedbackStore for InMemoryStore {
    fn append_feedback(&self, record: &FeedbackRecord) -> StorageResult<()> {
        let mut feedback = self.feedback.write().map_err(|_| StorageError::Poisoned)?;
        feedback
            .entry(record.content_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn list_feedback(&self, content_id: &str) -> StorageResult<Vec<FeedbackRecord>> {
        let feedback = self.feedback.read().map_err(|_| StorageError::Poisoned)?;
        Ok(feedback.get(content_id).cloned().unwrap_or_default())
    }
}

impl ProfileStore for InMemoryStore {
    fn get_profile(&self, user_id: &str) -> StorageResult<Option<LearnerProfile>> {
        let profiles = self.profiles.read().map_err(|_| StorageError::Poisoned)?;
        Ok(profiles.get(user_id).cloned())
    }

    fn put_profile(&self, profile: &LearnerProfile) -> StorageResult<()> {
        let mut profiles = self.profiles.write().map_err(|_| StorageError::Poisoned)?;
        profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{
        AgeCohort, ContentKind, ContentMetadata, DifficultyLevel, VerificationStatus,
    };
    use chrono::Utc;

    pub(crate) fn sample_record(id: &str, module: Option<&str>, order: u32) -> ContentRecord {
        let now = Utc::now();
        ContentRecord {
            id: id.to_string(),
            metadata: ContentMetadata {
                title: format!("Lesson {id}"),
                description: "A short lesson".to_string(),
                kind: ContentKind::Lesson,
                level: DifficultyLevel::Beginner,
                age_cohorts: [AgeCohort::from("8-10")].into_iter().collect(),
                keywords: vec![],
                objectives: vec![],
                estimated_minutes: Some(15),
                created_at: now,
                updated_at: now,
            },
            payload_location: format!("https://cdn.example/{id}.html"),
            thumbnail_location: None,
            access_requirements: vec![],
            module_id: module.map(str::to_string),
            order_within_module: order,
            verification_status: VerificationStatus::Draft,
            verification_history: vec![],
            ledger_record: None,
            superseded_ledger_records: vec![],
            creator_id: "creator-1".to_string(),
            created_at: now,
            updated_at: now,
            published_at: None,
            version: 0,
        }
    }

    #[test]
    fn insert_rejects_duplicate_ids() {
        let store = InMemoryStore::new();
        store.insert(&sample_record("c-1", None, 0)).unwrap();

        let result = store.insert(&sample_record("c-1", None, 0));
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[test]
    fn update_bumps_version_and_detects_stale_writes() {
        let store = InMemoryStore::new();
        let record = sample_record("c-1", None, 0);
        store.insert(&record).unwrap();

        let mut first = record.clone();
        first.metadata.title = "Renamed".to_string();
        let saved = store.update(&first).unwrap();
        assert_eq!(saved.version, 1);

        // Second writer still holds version 0
        let result = store.update(&record);
        assert!(matches!(
            result,
            Err(StorageError::Conflict { expected: 0, found: 1, .. })
        ));

        assert_eq!(store.get("c-1").unwrap().unwrap().metadata.title, "Renamed");
    }

    #[test]
    fn list_orders_by_module_then_position() {
        let store = InMemoryStore::new();
        store.insert(&sample_record("b", Some("m-1"), 2)).unwrap();
        store.insert(&sample_record("a", Some("m-1"), 1)).unwrap();
        store.insert(&sample_record("c", Some("m-2"), 0)).unwrap();

        let ids: Vec<String> = store
            .list(&ContentFilter::default())
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let module_two = store
            .list(&ContentFilter {
                module_id: Some("m-2".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(module_two.len(), 1);
    }

    #[test]
    fn access_records_are_keyed_per_user_and_content() {
        let store = InMemoryStore::new();
        store.put_access(&UserAccessRecord::new("u-1", "c-1")).unwrap();
        store.put_access(&UserAccessRecord::new("u-1", "c-2")).unwrap();
        store.put_access(&UserAccessRecord::new("u-2", "c-1")).unwrap();

        let mut granted = UserAccessRecord::new("u-1", "c-1");
        granted.access_granted = true;
        store.put_access(&granted).unwrap();

        assert_eq!(store.list_access_for_user("u-1").unwrap().len(), 2);
        assert!(store.get_access("u-1", "c-1").unwrap().unwrap().access_granted);
        assert!(!store.get_access("u-2", "c-1").unwrap().unwrap().access_granted);
        assert!(store.get_access("u-3", "c-1").unwrap().is_none());
    }

    #[test]
    fn feedback_keeps_insertion_order() {
        let store = InMemoryStore::new();
        for (user, rating) in [("u-1", 5), ("u-2", 3), ("u-3", 4)] {
            store
                .append_feedback(&FeedbackRecord {
                    content_id: "c-1".to_string(),
                    user_id: user.to_string(),
                    rating,
                    comment: None,
                    created_at: Utc::now(),
                })
                .unwrap();
        }

        let ratings: Vec<u8> = store
            .list_feedback("c-1")
            .unwrap()
            .into_iter()
            .map(|f| f.rating)
            .collect();
        assert_eq!(ratings, vec![5, 3, 4]);
        assert!(store.list_feedback("c-2").unwrap().is_empty());
    }
}
