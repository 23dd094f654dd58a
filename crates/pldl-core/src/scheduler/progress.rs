//! Task progress aggregated from per-track status.
//!
//! The download phase fills 0–85%; the rest is reserved for assembly.
//! Many workers report concurrently, so persistence is throttled.

use std::time::{Duration, Instant};

use crate::task_db::{TaskRecord, Track, TrackStatus};

/// Upper bound of task progress while tracks are still downloading.
pub const DOWNLOAD_PHASE_CEILING: f64 = 85.0;

/// Snapshot of track completion for one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Tracks that completed or errored.
    pub done: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProgressSnapshot {
    pub fn of(tracks: &[Track], selected: &[usize]) -> Self {
        let mut done = 0;
        let mut failed = 0;
        for t in selected.iter().filter_map(|&i| tracks.get(i)) {
            if t.status.is_settled() {
                done += 1;
            }
            if t.status == TrackStatus::Error {
                failed += 1;
            }
        }
        Self {
            done,
            failed,
            total: selected.len(),
        }
    }

    /// Download-phase percentage, rounded to two decimals.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let raw = self.done as f64 / self.total as f64 * DOWNLOAD_PHASE_CEILING;
        (raw * 100.0).round() / 100.0
    }

    pub fn message(&self) -> String {
        let mut msg = format!("Downloading {}/{}", self.done, self.total);
        if self.failed > 0 {
            msg.push_str(&format!(" (failed: {})", self.failed));
        }
        msg
    }

    pub fn is_finished(&self) -> bool {
        self.done >= self.total
    }
}

/// Applies snapshots to a task and decides when to persist.
#[derive(Debug)]
pub struct ProgressAggregator {
    interval: Duration,
    last_saved: Option<Instant>,
}

impl ProgressAggregator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_saved: None,
        }
    }

    /// Recompute progress for `task`. Returns true when the caller should
    /// persist: on `force`, when every track is done, or when the save
    /// interval has elapsed since the last persisted update.
    pub fn update(&mut self, task: &mut TaskRecord, selected: &[usize], force: bool) -> bool {
        let snap = ProgressSnapshot::of(task.tracks(), selected);
        task.raise_progress(snap.percent());
        task.message = snap.message();

        let due = force
            || snap.is_finished()
            || self
                .last_saved
                .map_or(true, |at| at.elapsed() >= self.interval);
        if due {
            self.last_saved = Some(Instant::now());
        }
        due
    }
}
