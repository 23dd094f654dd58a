//! Scripted in-process backend for unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{ClientIdentity, DownloadBackend, DownloadJob, FetchRequest};
use crate::retry::BackendError;
use crate::task_db::Playlist;

/// What the next call for a given key does.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Write one audio file named from the output template.
    Write,
    /// Succeed without writing anything.
    Nothing,
    BotCheck,
    /// Non-zero exit with output that carries no retry signal.
    ToolExit,
    Config,
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    playlist: Option<Playlist>,
    /// Keyed by track URL, or by query for searches.
    script: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<(FetchRequest, ClientIdentity)>>,
    delay: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

fn key(request: &FetchRequest) -> &str {
    match request {
        FetchRequest::Direct { url } | FetchRequest::Tool { url } => url,
        FetchRequest::Search { query } => query,
    }
}

fn render(template: &str, format: &str) -> String {
    template
        .replace("%(ext)s", format)
        .replace("%(id)s", "vid")
        .replace("{output-ext}", format)
        .replace("{artists}", "Tool Artist")
        .replace("{title}", "Tool Title")
        .replace("%%", "%")
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_playlist(mut self, playlist: Playlist) -> Self {
        self.playlist = Some(playlist);
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn script(&self, key: &str, steps: impl IntoIterator<Item = Step>) {
        self.script
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .extend(steps);
    }

    pub(crate) fn calls(&self) -> Vec<(FetchRequest, ClientIdentity)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadBackend for FakeBackend {
    async fn fetch_metadata(&self, _url: &str) -> Result<Playlist, BackendError> {
        self.playlist
            .clone()
            .ok_or_else(|| BackendError::Metadata("no playlist scripted".into()))
    }

    async fn download(
        &self,
        job: &DownloadJob,
        identity: &ClientIdentity,
    ) -> Result<(), BackendError> {
        self.calls
            .lock()
            .unwrap()
            .push((job.request.clone(), identity.clone()));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let step = self
            .script
            .lock()
            .unwrap()
            .get_mut(key(&job.request))
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Write);
        let result = match step {
            Step::Write => {
                let path = job.output_dir.join(render(&job.output_template, &job.format));
                tokio::fs::write(&path, b"audio").await.map_err(BackendError::from)
            }
            Step::Nothing => Ok(()),
            Step::BotCheck => Err(BackendError::Exited {
                tool: "fake".into(),
                code: Some(1),
                output: "ERROR: Sign in to confirm you're not a bot".into(),
            }),
            Step::ToolExit => Err(BackendError::Exited {
                tool: "fake".into(),
                code: Some(2),
                output: "unexpected failure".into(),
            }),
            Step::Config => Err(BackendError::Config("missing credentials".into())),
        };
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
