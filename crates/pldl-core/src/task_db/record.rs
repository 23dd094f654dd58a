//! Typed working copy of a task row.
//!
//! Status only changes through [`TaskRecord::transition`], which enforces the
//! lifecycle in [`TaskStatus::can_transition_to`]. The cancel-requested flag
//! is deliberately absent: it is owned by the store and only read through
//! `TaskStore::is_cancel_requested`.

use super::db::unix_timestamp;
use super::types::{Playlist, TaskId, TaskOptions, TaskStatus, Track, TrackStatus};
use crate::error::{truncate_message, PldlError};

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRecord {
    pub id: TaskId,
    pub owner: Option<String>,
    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,
    pub url: String,
    pub playlist: Option<Playlist>,
    pub options: TaskOptions,
    pub artifact_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub status_updated_at: i64,
}

impl TaskRecord {
    /// Fresh `pending` task as inserted by `create_task`.
    pub fn new(id: TaskId, url: &str, owner: Option<&str>) -> Self {
        let now = unix_timestamp();
        Self {
            id,
            owner: owner.map(str::to_string),
            status: TaskStatus::Pending,
            progress: 0.0,
            message: "Waiting for metadata...".to_string(),
            url: url.to_string(),
            playlist: None,
            options: TaskOptions::default(),
            artifact_path: None,
            created_at: now,
            updated_at: now,
            status_updated_at: now,
        }
    }

    /// Move to `next` and replace the message. Re-entering the current status
    /// only updates the message.
    pub fn transition(&mut self, next: TaskStatus, message: &str) -> Result<(), PldlError> {
        if self.status != next {
            if !self.status.can_transition_to(next) {
                return Err(PldlError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
            self.status_updated_at = unix_timestamp();
        }
        self.message = truncate_message(message);
        Ok(())
    }

    /// Record an unrecoverable failure. No-op for tasks that already finished.
    pub fn fail(&mut self, message: &str) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Error;
            self.status_updated_at = unix_timestamp();
            self.message = truncate_message(message);
        }
    }

    /// Raise progress; never lowers it.
    pub fn raise_progress(&mut self, value: f64) {
        let value = value.clamp(0.0, 100.0);
        if value > self.progress {
            self.progress = value;
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.playlist.as_ref().map(|p| p.title.as_str())
    }

    pub fn tracks(&self) -> &[Track] {
        self.playlist.as_ref().map(|p| p.tracks.as_slice()).unwrap_or(&[])
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.playlist.as_mut().and_then(|p| p.tracks.get_mut(index))
    }

    /// Resolve `options.selected_indices` against the playlist. Invalid or
    /// duplicate indices are dropped; an empty result selects every track.
    pub fn selected_indices(&self) -> Vec<usize> {
        let total = self.tracks().len();
        let mut out: Vec<usize> = Vec::new();
        for &i in &self.options.selected_indices {
            if i < total && !out.contains(&i) {
                out.push(i);
            }
        }
        if out.is_empty() {
            out = (0..total).collect();
        }
        out
    }

    /// Assign 1-based download indices and reset per-run track state.
    pub fn begin_run(&mut self, selected: &[usize]) {
        for (n, &i) in selected.iter().enumerate() {
            if let Some(track) = self.track_mut(i) {
                track.download_index = Some(n as u32 + 1);
                track.status = TrackStatus::Queued;
                track.error = None;
            }
        }
    }

    /// Up to `limit` "title: error" strings from failed tracks.
    pub fn failure_examples(&self, selected: &[usize], limit: usize) -> Vec<String> {
        let tracks = self.tracks();
        selected
            .iter()
            .filter_map(|&i| tracks.get(i))
            .filter(|t| t.status == TrackStatus::Error)
            .take(limit)
            .map(|t| {
                let err = t.error.as_deref().unwrap_or("unknown error");
                format!("{}: {}", t.title, err)
            })
            .collect()
    }
}
