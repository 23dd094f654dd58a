//! Download backend that writes placeholder audio files instead of running tools.
//!
//! Every download call is recorded. A track URL can be scripted to fail a
//! number of times with a bot-check before it succeeds.

use async_trait::async_trait;
use pldl_core::backend::{ClientIdentity, DownloadBackend, DownloadJob, FetchRequest};
use pldl_core::provider::Provider;
use pldl_core::retry::BackendError;
use pldl_core::task_db::{Playlist, Track};
use std::collections::HashMap;
use std::sync::Mutex;

pub struct ScriptedBackend {
    pub playlist_url: String,
    titles: Vec<String>,
    bot_checks: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedBackend {
    pub fn new(playlist_url: &str, titles: &[&str]) -> Self {
        Self {
            playlist_url: playlist_url.to_string(),
            titles: titles.iter().map(|t| t.to_string()).collect(),
            bot_checks: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn track_url(i: usize) -> String {
        format!("https://www.youtube.com/watch?v=track{i}")
    }

    /// Make the next `n` downloads of `url` fail with a bot-check.
    pub fn bot_check(&self, url: &str, n: usize) {
        self.bot_checks.lock().unwrap().insert(url.to_string(), n);
    }

    /// `(url, player_client)` for every download call, in order.
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

fn render(template: &str, format: &str) -> String {
    template
        .replace("%(ext)s", format)
        .replace("%(id)s", "vid")
        .replace("%%", "%")
}

#[async_trait]
impl DownloadBackend for ScriptedBackend {
    async fn fetch_metadata(&self, url: &str) -> Result<Playlist, BackendError> {
        if url != self.playlist_url {
            return Err(BackendError::Metadata(format!("unknown playlist {url}")));
        }
        let mut tracks: Vec<Track> = self
            .titles
            .iter()
            .enumerate()
            .map(|(i, title)| Track {
                id: format!("track{i}"),
                title: title.clone(),
                artist: "Integration Band".into(),
                url: Self::track_url(i),
                ..Default::default()
            })
            .collect();
        // Unplayable entry; dropped during resolution.
        tracks.push(Track {
            id: "private".into(),
            title: "[Private video]".into(),
            ..Default::default()
        });
        Ok(Playlist {
            title: "Integration Mix".into(),
            provider: Provider::Youtube,
            tracks,
            cover_url: None,
        })
    }

    async fn download(
        &self,
        job: &DownloadJob,
        identity: &ClientIdentity,
    ) -> Result<(), BackendError> {
        let url = match &job.request {
            FetchRequest::Direct { url } | FetchRequest::Tool { url } => url.clone(),
            FetchRequest::Search { query } => query.clone(),
        };
        self.calls
            .lock()
            .unwrap()
            .push((url.clone(), identity.player_client.clone()));

        let fail = {
            let mut scripted = self.bot_checks.lock().unwrap();
            match scripted.get_mut(&url) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(BackendError::Exited {
                tool: "yt-dlp".into(),
                code: Some(1),
                output: "ERROR: Sign in to confirm you're not a bot".into(),
            });
        }

        let name = render(&job.output_template, &job.format);
        tokio::fs::write(job.output_dir.join(name), b"ID3 fake audio")
            .await
            .map_err(BackendError::Io)
    }
}
