// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted collaborators for engine tests: call counters, failure switches
//! and an optional delay to widen race windows.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    AccessLedger, BlobPayload, BlobStorage, CollaboratorError, CollaboratorResult, FailureKind,
    InMemoryBlobStorage, InMemoryLedger, LedgerMetadata, LedgerReceipt, Service,
};

#[derive(Default)]
pub(crate) struct ScriptedLedger {
    inner: InMemoryLedger,
    pub store_calls: AtomicUsize,
    pub check_calls: AtomicUsize,
    pub grant_calls: AtomicUsize,
    pub completion_calls: AtomicUsize,
    pub fail_store: Mutex<Option<FailureKind>>,
    pub fail_check: Mutex<Option<FailureKind>>,
    pub fail_grant: Mutex<Option<FailureKind>>,
    pub fail_completion: Mutex<Option<FailureKind>>,
    /// Answer `false` to grant requests.
    pub refuse_grant: AtomicBool,
    /// Delay before each metadata write.
    pub store_delay: Mutex<Option<Duration>>,
}

impl ScriptedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryLedger {
        &self.inner
    }
}

/// Make every call guarded by `switch` fail with `kind`.
pub(crate) fn fail(switch: &Mutex<Option<FailureKind>>, kind: FailureKind) {
    *switch.lock().unwrap() = Some(kind);
}

pub(crate) fn heal(switch: &Mutex<Option<FailureKind>>) {
    *switch.lock().unwrap() = None;
}

fn tripped(
    service: Service,
    switch: &Mutex<Option<FailureKind>>,
    what: &str,
) -> CollaboratorResult<()> {
    match *switch.lock().unwrap() {
        Some(kind) => Err(CollaboratorError::new(service, kind, format!("scripted {what} failure"))),
        None => Ok(()),
    }
}

#[async_trait]
impl AccessLedger for ScriptedLedger {
    async fn store_metadata(
        &self,
        content_id: &str,
        metadata: &LedgerMetadata,
    ) -> CollaboratorResult<LedgerReceipt> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.store_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        tripped(Service::Ledger, &self.fail_store, "store_metadata")?;
        self.inner.store_metadata(content_id, metadata).await
    }

    async fn check_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        tripped(Service::Ledger, &self.fail_check, "check_access")?;
        self.inner.check_access(user_id, content_id).await
    }

    async fn grant_access(&self, user_id: &str, content_id: &str) -> CollaboratorResult<bool> {
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        tripped(Service::Ledger, &self.fail_grant, "grant_access")?;
        if self.refuse_grant.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.grant_access(user_id, content_id).await
    }

    async fn record_completion(
        &self,
        user_id: &str,
        content_id: &str,
    ) -> CollaboratorResult<bool> {
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        tripped(Service::Ledger, &self.fail_completion, "record_completion")?;
        self.inner.record_completion(user_id, content_id).await
    }
}

#[derive(Default)]
pub(crate) struct ScriptedBlobStorage {
    inner: InMemoryBlobStorage,
    pub upload_calls: AtomicUsize,
    pub resolve_calls: AtomicUsize,
    pub pin_calls: AtomicUsize,
    pub fail_upload: Mutex<Option<FailureKind>>,
    pub fail_resolve: Mutex<Option<FailureKind>>,
    pub fail_pin: Mutex<Option<FailureKind>>,
}

impl ScriptedBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStorage for ScriptedBlobStorage {
    async fn upload(&self, payload: &BlobPayload) -> CollaboratorResult<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        tripped(Service::BlobStorage, &self.fail_upload, "upload")?;
        self.inner.upload(payload).await
    }

    async fn resolve(&self, address: &str) -> CollaboratorResult<String> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        tripped(Service::BlobStorage, &self.fail_resolve, "resolve")?;
        self.inner.resolve(address).await
    }

    async fn pin(&self, address: &str) -> CollaboratorResult<bool> {
        self.pin_calls.fetch_add(1, Ordering::SeqCst);
        tripped(Service::BlobStorage, &self.fail_pin, "pin")?;
        self.inner.pin(address).await
    }
}
