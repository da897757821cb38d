// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-key async mutexes.
//!
//! A registry entry exists only while someone holds or waits for its key;
//! the last guard out removes it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Holds one key until dropped.
pub struct KeyGuard<'a> {
    registry: &'a KeyedLocks,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `key`.
    pub async fn lock(&self, key: &str) -> KeyGuard<'_> {
        // The shard reference must not be held across the await.
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        let guard = mutex.lock_owned().await;
        KeyGuard {
            registry: self,
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.registry
            .locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

/// Registry key for one learner on one content item.
pub fn access_key(user_id: &str, content_id: &str) -> String {
    format!("{user_id}\u{1f}{content_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_is_mutually_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("content-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_do_not_block_each_other() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;

        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn released_keys_are_pruned() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("a").await;
            let _b = locks.lock("b").await;
            assert_eq!(locks.len(), 2);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn entry_survives_while_a_waiter_remains() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.lock("a").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("a").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[test]
    fn access_keys_do_not_collide() {
        assert_ne!(access_key("a", "bc"), access_key("ab", "c"));
    }
}
