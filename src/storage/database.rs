// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded content database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `content`: content_id → serialized ContentRecord
//! - `access_records`: `user_id ␟ content_id` → serialized UserAccessRecord
//! - `feedback`: `content_id ␟ seq_be` → serialized FeedbackRecord
//! - `profiles`: user_id → serialized LearnerProfile
//! - `sequences`: name → next sequence number
//!
//! Composite keys use the ASCII unit separator (0x1F) so a prefix range scan
//! `[prefix␟, prefix␠)` covers exactly one owner.

use std::path::Path;

use redb::{ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::{
    ContentFilter, ContentRecord, FeedbackRecord, LearnerProfile, UserAccessRecord,
};

use super::{
    sort_for_listing, AccessRecordStore, ContentRepository, FeedbackStore, ProfileStore,
    StorageError, StorageResult,
};

// =============================================================================
// Table Definitions
// =============================================================================

const CONTENT: TableDefinition<&str, &[u8]> = TableDefinition::new("content");

const ACCESS_RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("access_records");

const FEEDBACK: TableDefinition<&[u8], &[u8]> = TableDefinition::new("feedback");

const PROFILES: TableDefinition<&str, &[u8]> = TableDefinition::new("profiles");

const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

const FEEDBACK_SEQUENCE: &str = "feedback";

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "lesson-ledger.redb";

const KEY_SEPARATOR: char = '\u{1f}';
const KEY_SEPARATOR_END: char = '\u{20}';

// =============================================================================
// Key Helpers
// =============================================================================

fn access_key(user_id: &str, content_id: &str) -> String {
    format!("{user_id}{KEY_SEPARATOR}{content_id}")
}

fn feedback_key(content_id: &str, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(content_id.len() + 1 + 8);
    key.extend_from_slice(content_id.as_bytes());
    key.push(KEY_SEPARATOR as u8);
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

fn feedback_prefix_bounds(content_id: &str) -> (Vec<u8>, Vec<u8>) {
    let mut start = content_id.as_bytes().to_vec();
    start.push(KEY_SEPARATOR as u8);
    let mut end = content_id.as_bytes().to_vec();
    end.push(KEY_SEPARATOR_END as u8);
    (start, end)
}

// =============================================================================
// Database
// =============================================================================

/// redb-backed implementation of every repository trait.
pub struct Database {
    db: redb::Database,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = redb::Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CONTENT)?;
            let _ = write_txn.open_table(ACCESS_RECORDS)?;
            let _ = write_txn.open_table(FEEDBACK)?;
            let _ = write_txn.open_table(PROFILES)?;
            let _ = write_txn.open_table(SEQUENCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Open the database file inside a data directory.
    pub fn open_in_dir(data_dir: &Path) -> StorageResult<Self> {
        Self::open(&data_dir.join(DATABASE_FILE))
    }
}

impl ContentRepository for Database {
    fn insert(&self, record: &ContentRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTENT)?;
            if table.get(record.id.as_str())?.is_some() {
                return Err(StorageError::AlreadyExists(format!("Content {}", record.id)));
            }
            table.insert(record.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, id: &str) -> StorageResult<Option<ContentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONTENT)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn update(&self, record: &ContentRecord) -> StorageResult<ContentRecord> {
        let mut next = record.clone();
        next.version += 1;
        let json = serde_json::to_vec(&next)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTENT)?;

            // Read the stored version before mutating
            let stored_bytes = {
                let existing = table
                    .get(record.id.as_str())?
                    .ok_or_else(|| StorageError::NotFound(format!("Content {}", record.id)))?;
                existing.value().to_vec()
            };
            let stored: ContentRecord = serde_json::from_slice(&stored_bytes)?;
            if stored.version != record.version {
                return Err(StorageError::Conflict {
                    entity: format!("Content {}", record.id),
                    expected: record.version,
                    found: stored.version,
                });
            }

            table.insert(record.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(next)
    }

    fn list(&self, filter: &ContentFilter) -> StorageResult<Vec<ContentRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CONTENT)?;

        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: ContentRecord = serde_json::from_slice(value.value())?;
            if filter.matches(&record) {
                records.push(record);
            }
        }
        sort_for_listing(&mut records);
        Ok(records)
    }
}

impl AccessRecordStore for Database {
    fn get_access(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> StorageResult<Option<UserAccessRecord>> {
        let key = access_key(user_id, content_id);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCESS_RECORDS)?;
        match table.get(key.as_str())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn put_access(&self, record: &UserAccessRecord) -> StorageResult<()> {
        let key = access_key(&record.user_id, &record.content_id);
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ACCESS_RECORDS)?;
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_access_for_user(&self, user_id: &str) -> StorageResult<Vec<UserAccessRecord>> {
        let start = format!("{user_id}{KEY_SEPARATOR}");
        let end = format!("{user_id}{KEY_SEPARATOR_END}");

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCESS_RECORDS)?;

        let mut records = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }
}

impl FeedbackStore for Database {
    fn append_feedback(&self, record: &FeedbackRecord) -> StorageResult<()> {
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut sequences = write_txn.open_table(SEQUENCES)?;
            let seq = sequences
                .get(FEEDBACK_SEQUENCE)?
                .map(|v| v.value())
                .unwrap_or(0);
            sequences.insert(FEEDBACK_SEQUENCE, seq + 1)?;

            let mut table = write_txn.open_table(FEEDBACK)?;
            let key = feedback_key(&record.content_id, seq);
            table.insert(key.as_slice(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_feedback(&self, content_id: &str) -> StorageResult<Vec<FeedbackRecord>> {
        let (start, end) = feedback_prefix_bounds(content_id);

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(FEEDBACK)?;

        let mut records = Vec::new();
        for entry in table.range(start.as_slice()..end.as_slice())? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }
}

impl ProfileStore for Database {
    fn get_profile(&self, user_id: &str) -> StorageResult<Option<LearnerProfile>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROFILES)?;
        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn put_profile(&self, profile: &LearnerProfile) -> StorageResult<()> {
        let json = serde_json::to_vec(profile)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(PROFILES)?;
            table.insert(profile.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
