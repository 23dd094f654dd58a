//! Task-level error taxonomy.
//!
//! Track-level failures never surface here; they are recorded on the track
//! and only become a task error when every selected track failed or the
//! artifact could not be assembled.

use crate::retry::BackendError;
use crate::task_db::TaskStatus;

/// Maximum length of any user-visible task or track message.
pub const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum PldlError {
    /// The playlist could not be turned into at least one playable track.
    #[error("metadata resolution failed: {0}")]
    MetadataResolution(String),

    /// A "successful" run left no audio file behind.
    #[error("no audio file was produced: {0}")]
    NoArtifactProduced(String),

    #[error("task {0} not found")]
    NotFound(String),

    /// Operation requested by a device that does not own the task.
    #[error("task {task_id} belongs to another device")]
    Ownership { task_id: String },

    /// Caller-side quota (per-owner queued/running limits).
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("cannot move task from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },

    #[error("task {0} is already running in this process")]
    AlreadyRunning(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Keep at most `MAX_MESSAGE_CHARS` characters, preferring the tail where
/// tool output usually carries the actual cause.
pub fn truncate_message(msg: &str) -> String {
    let msg = msg.trim();
    let count = msg.chars().count();
    if count <= MAX_MESSAGE_CHARS {
        return msg.to_string();
    }
    msg.chars().skip(count - MAX_MESSAGE_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_untouched() {
        assert_eq!(truncate_message("  boom \n"), "boom");
    }

    #[test]
    fn long_messages_keep_tail() {
        let long = format!("{}END", "é".repeat(600));
        let out = truncate_message(&long);
        assert_eq!(out.chars().count(), MAX_MESSAGE_CHARS);
        assert!(out.ends_with("END"));
    }
}
