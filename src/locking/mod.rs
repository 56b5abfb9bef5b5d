//! Per-resource locking
//!
//! Identifier-scoped mutual exclusion with FIFO fairness: concurrent
//! acquirers of the same identifier are granted the lock in call order,
//! while different identifiers stay independently concurrent. The lock
//! table is the only shared mutable state here.

use crate::model::ResourceIdentifier;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

type LockTable = Arc<StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>>;

/// An acquired, identifier-scoped mutual-exclusion token.
///
/// Dropping the lock releases it; releasing synchronously admits the next
/// queued acquirer. Leaking a lock deadlocks all future operations on its
/// identifier, which is why every code path holds it as a plain local.
pub struct ResourceLock {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    table: LockTable,
}

impl ResourceLock {
    /// Release explicitly; equivalent to dropping the lock
    pub fn release(self) {}
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        // Hand over to the next waiter before pruning the table entry
        self.guard.take();

        let mut table = self.table.lock().unwrap();
        if let Some(cell) = table.get(&self.key) {
            // Waiters each hold a clone while queued; strong count 1 means
            // nobody is using or waiting on this entry anymore
            if Arc::strong_count(cell) == 1 {
                table.remove(&self.key);
            }
        }
    }
}

/// Grants per-identifier locks
#[async_trait]
pub trait ResourceLocker: Send + Sync {
    /// Wait for and take the lock on one identifier
    async fn acquire(&self, identifier: &ResourceIdentifier) -> ResourceLock;
}

/// In-process locker backed by one fair async mutex per identifier.
///
/// Tokio's mutex queues waiters in FIFO order, which is exactly the
/// fairness contract; the ordering test below pins that behavior down
/// rather than trusting it silently.
pub struct MemoryResourceLocker {
    table: LockTable,
}

impl MemoryResourceLocker {
    /// Create a locker with an empty lock table
    pub fn new() -> Self {
        Self {
            table: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    #[cfg(test)]
    fn table_len(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}

impl Default for MemoryResourceLocker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceLocker for MemoryResourceLocker {
    async fn acquire(&self, identifier: &ResourceIdentifier) -> ResourceLock {
        let key = identifier.to_string();
        let cell = {
            let mut table = self.table.lock().unwrap();
            table
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        debug!("Acquiring lock on {}", key);
        let guard = cell.lock_owned().await;
        ResourceLock {
            guard: Some(guard),
            key,
            table: self.table.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_mutual_exclusion_per_identifier() {
        let locker = Arc::new(MemoryResourceLocker::new());
        let id = ResourceIdentifier::new("http://x/doc");
        let inside = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locker = locker.clone();
            let id = id.clone();
            let inside = inside.clone();
            handles.push(tokio::spawn(async move {
                let lock = locker.acquire(&id).await;
                assert!(!inside.swap(true, Ordering::SeqCst), "overlapping sections");
                tokio::task::yield_now().await;
                inside.store(false, Ordering::SeqCst);
                lock.release();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fifo_grant_order() {
        let locker = Arc::new(MemoryResourceLocker::new());
        let id = ResourceIdentifier::new("http://x/doc");
        let order = Arc::new(StdMutex::new(Vec::new()));

        // Hold the lock while the contenders queue up in timed order
        let first = locker.acquire(&id).await;

        let mut handles = Vec::new();
        for k in 0u64..4 {
            let locker = locker.clone();
            let id = id.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10 * (k + 1))).await;
                let lock = locker.acquire(&id).await;
                order.lock().unwrap().push(k);
                lock.release();
            }));
        }

        // Virtual time: every contender is parked in the queue by now
        tokio::time::sleep(Duration::from_millis(100)).await;
        first.release();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_different_identifiers_do_not_contend() {
        let locker = MemoryResourceLocker::new();
        let a = locker.acquire(&ResourceIdentifier::new("http://x/a")).await;
        // Completing this acquire while `a` is held proves independence
        let b = locker.acquire(&ResourceIdentifier::new("http://x/b")).await;
        a.release();
        b.release();
    }

    #[tokio::test]
    async fn test_table_is_pruned_after_release() {
        let locker = MemoryResourceLocker::new();
        let id = ResourceIdentifier::new("http://x/doc");

        let lock = locker.acquire(&id).await;
        assert_eq!(locker.table_len(), 1);
        lock.release();
        assert_eq!(locker.table_len(), 0);
    }
}
