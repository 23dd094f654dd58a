//! Cooperative, cached cancellation check.
//!
//! Track workers poll the gate before every attempt. Reads hit the store at
//! most once per window; concurrent misses wait on the same guard and reuse
//! the value the first one fetched. Once `true` has been observed it sticks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::task_db::TaskStore;

#[derive(Debug, Default)]
struct Cached {
    cancelled: bool,
    checked_at: Option<Instant>,
}

pub struct CancellationGate {
    store: Arc<dyn TaskStore>,
    task_id: String,
    window: Duration,
    cached: Mutex<Cached>,
    store_reads: AtomicUsize,
}

impl CancellationGate {
    pub fn new(store: Arc<dyn TaskStore>, task_id: String, window: Duration) -> Self {
        Self {
            store,
            task_id,
            window,
            cached: Mutex::new(Cached::default()),
            store_reads: AtomicUsize::new(0),
        }
    }

    /// Whether the task's cancel flag is set (possibly stale by up to one window).
    pub async fn should_cancel(&self) -> bool {
        let mut cached = self.cached.lock().await;
        if cached.cancelled {
            return true;
        }
        if let Some(at) = cached.checked_at {
            if at.elapsed() < self.window {
                return false;
            }
        }

        self.store_reads.fetch_add(1, Ordering::Relaxed);
        match self.store.is_cancel_requested(&self.task_id).await {
            Ok(flag) => cached.cancelled = flag,
            Err(e) => {
                tracing::warn!(task_id = %self.task_id, "cancel check failed: {:#}", e);
            }
        }
        cached.checked_at = Some(Instant::now());
        cached.cancelled
    }

    /// Store reads performed so far.
    pub fn store_reads(&self) -> usize {
        self.store_reads.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_db::{open_memory, TaskDb};

    async fn setup(window: Duration) -> (TaskDb, String, Arc<CancellationGate>) {
        let db = open_memory().await.unwrap();
        let id = db.create_task("https://example.com/p", None).await.unwrap();
        let gate = CancellationGate::new(Arc::new(db.clone()), id.clone(), window);
        (db, id, Arc::new(gate))
    }

    #[tokio::test]
    async fn cached_within_window() {
        let (db, id, gate) = setup(Duration::from_secs(60)).await;
        assert!(!gate.should_cancel().await);
        db.request_cancel(&id).await.unwrap();
        assert!(!gate.should_cancel().await, "stale value within window");
        assert_eq!(gate.store_reads(), 1);
    }

    #[tokio::test]
    async fn zero_window_reads_through_and_sticks() {
        let (db, id, gate) = setup(Duration::ZERO).await;
        assert!(!gate.should_cancel().await);
        db.request_cancel(&id).await.unwrap();
        assert!(gate.should_cancel().await);
        let reads = gate.store_reads();
        assert!(gate.should_cancel().await);
        assert_eq!(gate.store_reads(), reads, "sticky true skips the store");
    }

    #[tokio::test]
    async fn concurrent_misses_coalesce() {
        let (_db, _id, gate) = setup(Duration::from_secs(60)).await;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let g = Arc::clone(&gate);
            handles.push(tokio::spawn(async move { g.should_cancel().await }));
        }
        for h in handles {
            assert!(!h.await.unwrap());
        }
        assert_eq!(gate.store_reads(), 1);
    }
}
