use riptide_core::SlotKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-departure async locks.
///
/// Holders of the guard for a [`SlotKey`] have exclusive use of that
/// departure's check-and-commit window inside this process. Unrelated keys
/// never contend. Entries are held weakly and pruned once no guard is alive.
#[derive(Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<SlotKey, Weak<AsyncMutex<()>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &SlotKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            match locks.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    locks.retain(|_, weak| weak.strong_count() > 0);
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.clone(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Keys with a live lock, waiting or held
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;
    use uuid::Uuid;

    fn key(time: &str) -> SlotKey {
        SlotKey::new(Uuid::nil(), NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), time)
    }

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(SlotLocks::new());
        let guard = locks.acquire(&key("10:00")).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key("10:00")).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let locks = SlotLocks::new();
        let _a = locks.acquire(&key("10:00")).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&key("14:00")))
            .await
            .expect("other departures stay free");
        assert_eq!(locks.active(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = SlotLocks::new();
        drop(locks.acquire(&key("10:00")).await);
        assert_eq!(locks.active(), 0);
    }
}
