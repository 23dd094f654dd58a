//! Types stored in the task database.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::provider::Provider;

/// Task identifier (UUID v4 string).
pub type TaskId = String;

/// Lifecycle status of a task, stored as a string in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Preparing,
    Ready,
    Queued,
    Downloading,
    Zipping,
    Completed,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Preparing => "preparing",
            TaskStatus::Ready => "ready",
            TaskStatus::Queued => "queued",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Zipping => "zipping",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => TaskStatus::Pending,
            "preparing" => TaskStatus::Preparing,
            "ready" => TaskStatus::Ready,
            "queued" => TaskStatus::Queued,
            "downloading" => TaskStatus::Downloading,
            "zipping" => TaskStatus::Zipping,
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Cancelled
        )
    }

    /// Edges of the task state machine. `error` and `cancelled` are reachable
    /// from every non-terminal state; terminal states have no way out.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Error)
                | (_, Cancelled)
                | (Pending, Preparing)
                | (Preparing, Ready)
                | (Ready, Queued)
                | (Ready, Downloading)
                | (Queued, Downloading)
                | (Downloading, Zipping)
                | (Zipping, Completed)
        )
    }

    /// Statuses counted against an owner's running quota: work that is
    /// holding capacity right now.
    pub const RUNNING: [TaskStatus; 2] = [TaskStatus::Downloading, TaskStatus::Zipping];

    /// Statuses counted against an owner's queued quota: tasks waiting to
    /// be resolved, started or scheduled.
    pub const WAITING: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Preparing,
        TaskStatus::Queued,
        TaskStatus::Ready,
    ];
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run status of one track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    #[default]
    Pending,
    Queued,
    Downloading,
    Completed,
    Error,
    Cancelled,
}

impl TrackStatus {
    /// Counted as "done" by progress aggregation.
    pub fn is_settled(self) -> bool {
        matches!(self, TrackStatus::Completed | TrackStatus::Error)
    }
}

/// One downloadable unit within a resolved playlist.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    pub url: String,
    #[serde(default)]
    pub status: TrackStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 1-based position within the current run's selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_index: Option<u32>,
}

/// Resolved playlist stored as JSON on the task row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Playlist {
    pub title: String,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

fn default_format() -> String {
    "mp3".to_string()
}

fn default_template() -> String {
    "{title}".to_string()
}

/// User options chosen before starting a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOptions {
    /// 0-based indices into `Playlist::tracks`. Empty selects everything.
    #[serde(default)]
    pub selected_indices: Vec<usize>,
    #[serde(default = "default_format")]
    pub format: String,
    /// Supports `{title}`, `{artist}`, `{album}`, `{year}` and `{track_number}`.
    #[serde(default = "default_template")]
    pub filename_template: String,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            selected_indices: Vec::new(),
            format: default_format(),
            filename_template: default_template(),
        }
    }
}

/// Summary view used by the CLI `status` and `history` commands.
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: TaskId,
    pub owner: Option<String>,
    pub status: TaskStatus,
    pub progress: f64,
    pub message: String,
    pub title: Option<String>,
    pub artifact_path: Option<String>,
    pub created_at: i64,
}
