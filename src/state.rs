// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::engine::{Engine, EngineStores};
use crate::ledger::{AccessLedger, BlobStorage, InMemoryBlobStorage, InMemoryLedger};
use crate::storage::InMemoryStore;

/// Which backends the process was started with, reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backends {
    pub storage: &'static str,
    pub ledger: &'static str,
    pub blob_storage: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub backends: Backends,
}

impl AppState {
    pub fn new(
        stores: EngineStores,
        ledger: Arc<dyn AccessLedger>,
        blobs: Arc<dyn BlobStorage>,
        backends: Backends,
    ) -> Self {
        Self {
            engine: Arc::new(Engine::new(stores, ledger, blobs)),
            backends,
        }
    }
}

impl Default for AppState {
    /// Everything in-process; nothing survives a restart.
    fn default() -> Self {
        Self::new(
            EngineStores::shared(Arc::new(InMemoryStore::new())),
            Arc::new(InMemoryLedger::new()),
            Arc::new(InMemoryBlobStorage::default()),
            Backends {
                storage: "memory",
                ledger: "memory",
                blob_storage: "memory",
            },
        )
    }
}
