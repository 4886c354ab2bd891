use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Named in-process locks serializing launches of the same container.
///
/// An entry lives only while someone holds or waits for its lock.
#[derive(Debug, Default)]
pub struct LaunchLocks {
    inner: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive use of one name; dropping it releases the lock.
#[derive(Debug)]
pub struct LaunchGuard<'a> {
    locks: &'a LaunchLocks,
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl LaunchLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `name`.
    pub async fn acquire(&self, name: &str) -> LaunchGuard<'_> {
        let lock = self
            .inner
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        LaunchGuard {
            locks: self,
            name: name.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Number of names currently held or awaited.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Drop for LaunchGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters hold their own clone, so a count of one means only the map is left.
        self.locks
            .inner
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_name_is_serialized() {
        let locks = Arc::new(LaunchLocks::new());
        let guard = locks.acquire("a_q_worker").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("a_q_worker").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn different_names_do_not_block() {
        let locks = LaunchLocks::new();
        let _a = locks.acquire("a_q_worker").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b_q_worker")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_names_are_forgotten() {
        let locks = Arc::new(LaunchLocks::new());
        let guard = locks.acquire("a_q_worker").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("a_q_worker").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        drop(guard);
        assert_eq!(locks.len(), 1, "entry must survive while a waiter is queued");

        waiter.await.unwrap();
        assert!(locks.is_empty());

        for i in 0..100 {
            drop(locks.acquire(&format!("t{i}_q_worker")).await);
        }
        assert!(locks.is_empty());
    }
}
