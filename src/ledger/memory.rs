// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process collaborators for development runs without a ledger service
//! or blob storage. Nothing here survives a restart.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::{
    AccessLedger, BlobPayload, BlobStorage, CollaboratorError, CollaboratorResult,
    LedgerMetadata, LedgerReceipt, Service,
};

/// Ledger that keeps grants, completions and metadata in memory.
#[derive(Default)]
pub struct InMemoryLedger {
    metadata: RwLock<HashMap<String, Vec<LedgerMetadata>>>,
    grants: RwLock<HashSet<(String, String)>>,
    completions: RwLock<HashSet<(String, String)>>,
    height: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metadata writes recorded for a content id, oldest first.
    pub fn metadata_for(&self, content_id: &str) -> Vec<LedgerMetadata> {
        self.metadata
            .read()
            .map(|m| m.get(content_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn has_completion(&self, user_id: &str, content_id: &str) -> bool {
        self.completions
            .read()
            .map(|c| c.contains(&(user_id.to_string(), content_id.to_string())))
            .unwrap_or(false)
    }
}

fn poisoned() -> CollaboratorError {
    CollaboratorError::permanent(Service::Ledger, "in-memory ledger lock poisoned")
}

#[async_trait]
impl AccessLedger for InMemoryLedger {
    async fn store_metadata(
        &self,
        content_id: &str,
        metadata: &LedgerMetadata,
    ) -> CollaboratorResult<LedgerReceipt> {
        let block_height = self.height.fetch_add(1, Ordering::SeqCst) + 1;
        self.metadata
            .write()
            .map_err(|_| poisoned())?
            .entry(content_id.to_string())
            .or_default()
            .push(metadata.clone());

        debug!(content_id = %content_id, block_height, "Recorded metadata in memory ledger");
        Ok(LedgerReceipt {
            transaction_ref: format!("mem-{block_height:08}-{content_id}"),
            timestamp: Utc::now(),
            block_height: Some(block_height),
        })
    }

    async fn check_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool> {
        let grants = self.grants.read().map_err(|_| poisoned())?;
        Ok(grants.contains(&(user_id.to_string(), content_id.to_string())))
    }

    async fn grant_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool> {
        self.grants
            .write()
            .map_err(|_| poisoned())?
            .insert((user_id.to_string(), content_id.to_string()));
        Ok(true)
    }

    async fn record_completion(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> CollaboratorResult<bool> {
        self.completions
            .write()
            .map_err(|_| poisoned())?
            .insert((user_id.to_string(), content_id.to_string()));
        Ok(true)
    }
}

/// Blob storage that derives a `sha256:` address from the source location and
/// resolves addresses against a fixed gateway URL.
pub struct InMemoryBlobStorage {
    gateway: String,
    pinned: RwLock<HashSet<String>>,
}

impl InMemoryBlobStorage {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into().trim_end_matches('/').to_string(),
            pinned: RwLock::new(HashSet::new()),
        }
    }

    pub fn is_pinned(&self, address: &str) -> bool {
        self.pinned
            .read()
            .map(|p| p.contains(address))
            .unwrap_or(false)
    }
}

impl Default for InMemoryBlobStorage {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_BLOB_GATEWAY)
    }
}

#[async_trait]
impl BlobStorage for InMemoryBlobStorage {
    async fn upload(&self, payload: &BlobPayload) -> CollaboratorResult<String> {
        let digest = Sha256::digest(payload.source_location.as_bytes());
        Ok(format!("sha256:{digest:x}"))
    }

    async fn resolve(&self, address: &str) -> CollaboratorResult<String> {
        Ok(format!("{}/{}", self.gateway, address))
    }

    async fn pin(&self, address: &str) -> CollaboratorResult<bool> {
        self.pinned
            .write()
            .map_err(|_| {
                CollaboratorError::permanent(Service::BlobStorage, "in-memory pin set poisoned")
            })?
            .insert(address.to_string());
        Ok(true)
    }
}
