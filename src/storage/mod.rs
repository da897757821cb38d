// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Repository traits for everything the engine persists, plus two backends:
//!
//! - [`InMemoryStore`]: process-local maps, used in tests and when no data
//!   directory is configured
//! - [`Database`]: embedded redb database under `DATA_DIR`
//!
//! Repositories are pure data access. They enforce no lifecycle policy; the
//! only check they make is the optimistic `version` comparison on content
//! updates, which surfaces as [`StorageError::Conflict`].
//!
//! ## Layout
//!
//! ```text
//! content         id                  -> ContentRecord (JSON)
//! access_records  user_id ␟ content_id -> UserAccessRecord (JSON)
//! feedback        content_id ␟ seq     -> FeedbackRecord (JSON)
//! profiles        user_id             -> LearnerProfile (JSON)
//! ```

pub mod database;
pub mod memory;

pub use database::Database;
pub use memory::InMemoryStore;

use crate::models::{
    ContentFilter, ContentRecord, FeedbackRecord, LearnerProfile, UserAccessRecord,
};

/// Error type for repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict on {entity}: expected {expected}, found {found}")]
    Conflict {
        entity: String,
        expected: u64,
        found: u64,
    },

    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("in-memory store lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Keyed storage of content records.
pub trait ContentRepository: Send + Sync {
    /// Store a new record. Fails with `AlreadyExists` if the id is taken.
    fn insert(&self, record: &ContentRecord) -> StorageResult<()>;

    /// Load a record by id.
    fn get(&self, id: &str) -> StorageResult<Option<ContentRecord>>;

    /// Replace a record whose stored version still equals `record.version`.
    ///
    /// Returns the persisted record carrying the bumped version.
    fn update(&self, record: &ContentRecord) -> StorageResult<ContentRecord>;

    /// All records matching the filter, ordered by module then position.
    fn list(&self, filter: &ContentFilter) -> StorageResult<Vec<ContentRecord>>;
}

/// Per-(user, content) access and progress records.
pub trait AccessRecordStore: Send + Sync {
    fn get_access(&self, user_id: &str, content_id: &str)
        -> StorageResult<Option<UserAccessRecord>>;

    /// Create or replace the record for its (user, content) key.
    fn put_access(&self, record: &UserAccessRecord) -> StorageResult<()>;

    fn list_access_for_user(&self, user_id: &str) -> StorageResult<Vec<UserAccessRecord>>;
}

/// Append-only feedback storage.
pub trait FeedbackStore: Send + Sync {
    fn append_feedback(&self, record: &FeedbackRecord) -> StorageResult<()>;

    /// Feedback for one content item in insertion order.
    fn list_feedback(&self, content_id: &str) -> StorageResult<Vec<FeedbackRecord>>;
}

/// Learner badges and cohort.
pub trait ProfileStore: Send + Sync {
    fn get_profile(&self, user_id: &str) -> StorageResult<Option<LearnerProfile>>;

    fn put_profile(&self, profile: &LearnerProfile) -> StorageResult<()>;
}

/// Ordering used by every `ContentRepository::list` implementation.
pub(crate) fn sort_for_listing(records: &mut [ContentRecord]) {
    records.sort_by(|a, b| {
        a.module_id
            .cmp(&b.module_id)
            .then(a.order_within_module.cmp(&b.order_within_module))
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}
