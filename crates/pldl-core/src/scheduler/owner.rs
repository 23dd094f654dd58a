//! Per-owner mutual exclusion: one active download run per device.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Lock key shared by tasks without a usable owner identity.
pub const UNKNOWN_OWNER: &str = "__unknown__";

/// Normalize an owner identity into a lock key.
pub fn owner_key(owner: Option<&str>) -> String {
    match owner.map(str::trim) {
        Some(o) if !o.is_empty() => o.to_string(),
        _ => UNKNOWN_OWNER.to_string(),
    }
}

/// Process-scoped registry of owner locks.
///
/// Entries are created lazily on first use and never evicted; the table only
/// grows with the number of distinct devices seen. The map itself is guarded
/// by a short-lived std mutex; waiting for an owner happens on the per-owner
/// tokio mutex, which hands the lock out in arrival order.
#[derive(Debug, Default)]
pub struct OwnerScheduler {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held while a run owns its device slot; released on drop.
#[derive(Debug)]
pub struct OwnerGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl OwnerGuard {
    pub fn owner_key(&self) -> &str {
        &self.key
    }
}

impl OwnerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Wait until the owner's slot is free.
    pub async fn acquire(&self, owner: Option<&str>) -> OwnerGuard {
        let key = owner_key(owner);
        let guard = self.handle(&key).lock_owned().await;
        OwnerGuard { key, _guard: guard }
    }

    /// Take the owner's slot only if nobody holds it right now.
    pub fn try_acquire(&self, owner: Option<&str>) -> Option<OwnerGuard> {
        let key = owner_key(owner);
        let guard = self.handle(&key).try_lock_owned().ok()?;
        Some(OwnerGuard { key, _guard: guard })
    }

    /// Number of owners seen by this process.
    pub fn known_owners(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or_else(|e| e.into_inner().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn blank_and_missing_owners_share_a_key() {
        assert_eq!(owner_key(None), UNKNOWN_OWNER);
        assert_eq!(owner_key(Some("   ")), UNKNOWN_OWNER);
        assert_eq!(owner_key(Some(" dev-1 ")), "dev-1");
    }

    #[tokio::test]
    async fn one_holder_per_owner() {
        let sched = OwnerScheduler::new();
        let first = sched.try_acquire(Some("dev-1")).expect("free");
        assert!(sched.try_acquire(Some("dev-1")).is_none());
        assert!(sched.try_acquire(Some("dev-2")).is_some());
        assert_eq!(first.owner_key(), "dev-1");
        drop(first);
        assert!(sched.try_acquire(Some("dev-1")).is_some());
        assert_eq!(sched.known_owners(), 2);
    }

    #[tokio::test]
    async fn waiter_proceeds_after_release() {
        let sched = Arc::new(OwnerScheduler::new());
        let held = sched.acquire(None).await;

        let s = Arc::clone(&sched);
        let waiter = tokio::spawn(async move {
            let _g = s.acquire(Some("")).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
