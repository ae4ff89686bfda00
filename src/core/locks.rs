//! Per-user async locks
//!
//! `DashMap` serializes access to a single ledger entry, but a purchase is a
//! read-check-debit-record sequence spanning several entries. `UserLocks`
//! serializes those sequences per user id while leaving different users free
//! to proceed in parallel. The guard is a tokio mutex guard, so it may be held
//! across `.await` points.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::UserId;

/// Table of per-user mutexes, created on demand
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `user`
    pub async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting
        let lock = self
            .locks
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }

    /// Drop locks nobody holds or waits for
    ///
    /// An entry whose `Arc` is only referenced by the table is free; a later
    /// `acquire` recreates it. Entries cloned by a pending `acquire` are kept.
    ///
    /// # Returns
    ///
    /// Number of locks dropped
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before.saturating_sub(self.locks.len())
    }

    /// Number of users with a lock in the table
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_user_is_serialized() {
        let locks = Arc::new(UserLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_inside = Arc::clone(&max_inside);
                tokio::spawn(async move {
                    let _guard = locks.acquire(1).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = UserLocks::new();
        drop(locks.acquire(1).await);
        let held = locks.acquire(2).await;

        assert_eq!(locks.prune(), 1);
        assert_eq!(locks.len(), 1);

        // A pruned user gets a fresh lock; the held one still excludes
        let _again = locks.acquire(1).await;
        let blocked = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(blocked.is_err());

        drop(held);
        drop(_again);
        assert_eq!(locks.prune(), 2);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let locks = UserLocks::new();

        let _first = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;

        assert!(second.is_ok());
    }
}
