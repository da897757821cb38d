// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: the access ledger and content-addressed blob
//! storage.
//!
//! Both are slow, remote and allowed to fail. The engine only sees the
//! [`AccessLedger`] and [`BlobStorage`] traits:
//!
//! - [`http`] talks to the real services over JSON/HTTP
//! - [`memory`] keeps everything in-process for development runs
//!
//! Every failure carries a [`FailureKind`] so callers can tell a retryable
//! outage from a refused request, and a timed-out call (outcome unknown)
//! from both.

pub mod http;
pub mod memory;
#[cfg(test)]
pub(crate) mod testing;

pub use http::{HttpBlobStorageClient, HttpLedgerClient};
pub use memory::{InMemoryBlobStorage, InMemoryLedger};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{ContentKind, ContentRecord, DifficultyLevel, LedgerRecord};

// =============================================================================
// Errors
// =============================================================================

/// Which collaborator produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Ledger,
    BlobStorage,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::Ledger => write!(f, "ledger"),
            Service::BlobStorage => write!(f, "blob storage"),
        }
    }
}

/// Classification of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Outage or overload; the same request may succeed later.
    Transient,
    /// The service refused the request; retrying will not help.
    Permanent,
    /// No answer before the deadline. The remote side may or may not have
    /// applied the request, so a retry must not assume it did not.
    Indeterminate,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
            FailureKind::Indeterminate => write!(f, "indeterminate"),
        }
    }
}

/// Error returned by a collaborator call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{service} {kind} failure: {message}")]
pub struct CollaboratorError {
    pub service: Service,
    pub kind: FailureKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(service: Service, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            service,
            kind,
            message: message.into(),
        }
    }

    pub fn transient(service: Service, message: impl Into<String>) -> Self {
        Self::new(service, FailureKind::Transient, message)
    }

    pub fn permanent(service: Service, message: impl Into<String>) -> Self {
        Self::new(service, FailureKind::Permanent, message)
    }

    pub fn indeterminate(service: Service, message: impl Into<String>) -> Self {
        Self::new(service, FailureKind::Indeterminate, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind != FailureKind::Permanent
    }
}

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

// =============================================================================
// Wire Types
// =============================================================================

/// Subset of a content record anchored on the ledger at publish time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerMetadata {
    pub content_id: String,
    pub title: String,
    pub kind: ContentKind,
    pub level: DifficultyLevel,
    pub creator_id: String,
    pub payload_address: String,
    /// Fingerprint of the approving decision, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_fingerprint: Option<String>,
}

impl LedgerMetadata {
    pub fn from_record(record: &ContentRecord, payload_address: &str) -> Self {
        let approval_fingerprint = record
            .verification_history
            .iter()
            .rev()
            .find(|d| d.status == crate::models::VerificationStatus::Verified)
            .map(|d| d.fingerprint.clone());

        Self {
            content_id: record.id.clone(),
            title: record.metadata.title.clone(),
            kind: record.metadata.kind,
            level: record.metadata.level,
            creator_id: record.creator_id.clone(),
            payload_address: payload_address.to_string(),
            approval_fingerprint,
        }
    }
}

/// Receipt of a ledger metadata write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerReceipt {
    pub transaction_ref: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
}

impl From<LedgerReceipt> for LedgerRecord {
    fn from(receipt: LedgerReceipt) -> Self {
        LedgerRecord {
            transaction_ref: receipt.transaction_ref,
            recorded_at: receipt.timestamp,
            block_height: receipt.block_height,
        }
    }
}

/// Payload handed to blob storage. The service ingests from `source_location`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobPayload {
    pub content_id: String,
    pub source_location: String,
}

/// Whether a location already names content-addressed storage.
///
/// Recognises `ipfs://` and `sha256:` URIs and bare CIDs (v0 `Qm…`, v1 `bafy…`).
pub fn is_content_addressed(location: &str) -> bool {
    let location = location.trim();
    if location.starts_with("ipfs://") || location.starts_with("sha256:") {
        return true;
    }
    let is_base58ish = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric());
    (location.starts_with("Qm") && location.len() == 46 && is_base58ish(location))
        || (location.starts_with("bafy") && location.len() >= 50 && is_base58ish(location))
}

// =============================================================================
// Collaborator Traits
// =============================================================================

/// Trust-anchor ledger recording publications, grants and completions.
#[async_trait]
pub trait AccessLedger: Send + Sync {
    async fn store_metadata(
        &self,
        content_id: &str,
        metadata: &LedgerMetadata,
    ) -> CollaboratorResult<LedgerReceipt>;

    async fn check_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool>;

    async fn grant_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool>;

    async fn record_completion(&self, user_id: &str, content_id: &str)
        -> CollaboratorResult<bool>;
}

/// Content-addressed payload storage.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store a payload and return its content address.
    async fn upload(&self, payload: &BlobPayload) -> CollaboratorResult<String>;

    /// Retrieval URL for a content address.
    async fn resolve(&self, address: &str) -> CollaboratorResult<String>;

    /// Best-effort durability hint.
    async fn pin(&self, address: &str) -> CollaboratorResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_content_addresses() {
        assert!(is_content_addressed("ipfs://bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"));
        assert!(is_content_addressed("sha256:9f86d081884c7d659a2feaa0c55ad015"));
        assert!(is_content_addressed("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG"));
        assert!(is_content_addressed(
            "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
        ));

        assert!(!is_content_addressed("https://cdn.example/lesson.mp4"));
        assert!(!is_content_addressed("Qmshort"));
        assert!(!is_content_addressed(""));
    }

    #[test]
    fn only_permanent_failures_are_final() {
        assert!(CollaboratorError::transient(Service::Ledger, "503").is_retryable());
        assert!(CollaboratorError::indeterminate(Service::Ledger, "timeout").is_retryable());
        assert!(!CollaboratorError::permanent(Service::Ledger, "400").is_retryable());
    }

    #[test]
    fn error_message_names_service_and_kind() {
        let err = CollaboratorError::transient(Service::BlobStorage, "connection refused");
        assert_eq!(
            err.to_string(),
            "blob storage transient failure: connection refused"
        );
    }
}
