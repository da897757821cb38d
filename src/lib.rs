// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Lesson Ledger - Verified Educational Content Service
//!
//! Content moves through human review before it is published to a ledger
//! that anchors its approval. Learners are then gated by explicit grants,
//! prerequisite requirements or the ledger, and their progress and
//! feedback are tracked locally.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Caller identity and role checks from gateway headers
//! - `engine` - Lifecycle, access, progress, feedback and profile logic
//! - `ledger` - Ledger and blob-storage collaborators
//! - `storage` - Repositories over redb or memory

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod state;
pub mod storage;
