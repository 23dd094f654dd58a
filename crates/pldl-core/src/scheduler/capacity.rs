//! Global bound on simultaneously active track downloads.
//!
//! Every track holds one slot for its whole download, including rotation
//! attempts and backoff sleeps, regardless of which task or owner it belongs to.

use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug)]
pub struct CapacityLimiter {
    max: usize,
    semaphore: Arc<Semaphore>,
    in_use: Arc<AtomicUsize>,
}

/// One held slot; released when dropped.
#[derive(Debug)]
pub struct CapacityPermit {
    _permit: OwnedSemaphorePermit,
    in_use: Arc<AtomicUsize>,
}

impl Drop for CapacityPermit {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl CapacityLimiter {
    /// Create a limiter with `max` slots (at least 1).
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            max,
            semaphore: Arc::new(Semaphore::new(max)),
            in_use: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<CapacityPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| anyhow::anyhow!("capacity limiter closed"))?;
        self.in_use.fetch_add(1, Ordering::AcqRel);
        Ok(CapacityPermit {
            _permit: permit,
            in_use: Arc::clone(&self.in_use),
        })
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_and_release() {
        let limiter = CapacityLimiter::new(2);
        assert_eq!(limiter.available(), 2);
        let a = limiter.acquire().await.unwrap();
        let b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_use(), 2);
        assert_eq!(limiter.available(), 0);
        drop(a);
        assert_eq!(limiter.in_use(), 1);
        assert_eq!(limiter.available(), 1);
        drop(b);
        assert_eq!(limiter.in_use(), 0);
    }

    #[tokio::test]
    async fn zero_means_one_and_blocks_when_full() {
        let limiter = Arc::new(CapacityLimiter::new(0));
        assert_eq!(limiter.max(), 1);
        let held = limiter.acquire().await.unwrap();
        let l = Arc::clone(&limiter);
        let waiter = tokio::spawn(async move { l.acquire().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        drop(held);
        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter should get the slot")
            .unwrap()
            .unwrap();
    }
}
