// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Engine
//!
//! Business rules of the service, independent of HTTP:
//!
//! - [`lifecycle`]: verification state machine and publishing
//! - [`access`]: access decisions, grants and content opening
//! - [`progress`]: per-learner progress and completion
//! - [`feedback`]: append-only ratings
//! - [`profiles`]: learner badges and cohort
//!
//! Mutations of one content record are serialized per content id; grant,
//! open and progress writes are serialized per (user, content) key. Locks
//! come from [`locks::KeyedLocks`] and are never global.

pub mod access;
pub mod feedback;
pub mod lifecycle;
pub mod locks;
pub mod profiles;
pub mod progress;

pub use access::{AccessBasis, AccessControl, AccessDecision, OpenedContent};
pub use feedback::FeedbackLedger;
pub use lifecycle::ContentLifecycle;
pub use profiles::LearnerProfiles;
pub use progress::{CompletionRecording, ProgressOutcome, ProgressReport, ProgressTracker};

use std::sync::Arc;

use crate::ledger::{AccessLedger, BlobStorage, CollaboratorError, FailureKind};
use crate::models::VerificationStatus;
use crate::storage::{
    AccessRecordStore, ContentRepository, FeedbackStore, ProfileStore, StorageError,
};

// =============================================================================
// Errors
// =============================================================================

/// Collaborator call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalStep {
    BlobUpload,
    BlobResolve,
    LedgerWrite,
    LedgerCheck,
    LedgerGrant,
}

impl ExternalStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalStep::BlobUpload => "blob_upload",
            ExternalStep::BlobResolve => "blob_resolve",
            ExternalStep::LedgerWrite => "ledger_write",
            ExternalStep::LedgerCheck => "ledger_check",
            ExternalStep::LedgerGrant => "ledger_grant",
        }
    }
}

impl std::fmt::Display for ExternalStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Cannot {action} content in state {from}")]
    InvalidTransition {
        from: VerificationStatus,
        action: &'static str,
    },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("{step} failed: {source}")]
    ExternalService {
        step: ExternalStep,
        #[source]
        source: CollaboratorError,
    },

    #[error("Concurrent modification: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl EngineError {
    pub fn external(step: ExternalStep) -> impl FnOnce(CollaboratorError) -> EngineError {
        move |source| EngineError::ExternalService { step, source }
    }

    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::ExternalService { source, .. } => source.is_retryable(),
            EngineError::Conflict(_) => true,
            _ => false,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            EngineError::ExternalService { source, .. } => Some(source.kind),
            _ => None,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => EngineError::NotFound(what),
            StorageError::Conflict { .. } => EngineError::Conflict(err.to_string()),
            other => EngineError::Storage(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Engine
// =============================================================================

/// Repository handles the engine writes through.
#[derive(Clone)]
pub struct EngineStores {
    pub content: Arc<dyn ContentRepository>,
    pub access: Arc<dyn AccessRecordStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl EngineStores {
    /// Use one backend for every repository.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ContentRepository + AccessRecordStore + FeedbackStore + ProfileStore + 'static,
    {
        Self {
            content: store.clone(),
            access: store.clone(),
            feedback: store.clone(),
            profiles: store,
        }
    }
}

/// All engine components wired to the same stores and collaborators.
pub struct Engine {
    pub lifecycle: ContentLifecycle,
    pub access: AccessControl,
    pub progress: ProgressTracker,
    pub feedback: FeedbackLedger,
    pub profiles: LearnerProfiles,
}

impl Engine {
    pub fn new(
        stores: EngineStores,
        ledger: Arc<dyn AccessLedger>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        // Grants, opens and progress reports share one registry so every
        // write to a (user, content) record is serialized.
        let access_locks = Arc::new(locks::KeyedLocks::new());

        Self {
            lifecycle: ContentLifecycle::new(stores.content.clone(), ledger.clone(), blobs.clone()),
            access: AccessControl::new(
                stores.content.clone(),
                stores.access.clone(),
                stores.profiles.clone(),
                ledger.clone(),
                blobs,
                access_locks.clone(),
            ),
            progress: ProgressTracker::new(
                stores.content.clone(),
                stores.access.clone(),
                ledger,
                access_locks,
            ),
            feedback: FeedbackLedger::new(stores.content.clone(), stores.feedback.clone()),
            profiles: LearnerProfiles::new(stores.profiles),
        }
    }
}
