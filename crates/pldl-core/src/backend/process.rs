//! [`DownloadBackend`] backed by the yt-dlp and spotdl executables.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::args;
use super::cookies::prepare_cookie_file;
use super::identity::ClientIdentity;
use super::metadata::{parse_spotdl_save, parse_ytdlp_flat};
use super::{DownloadBackend, DownloadJob, FetchRequest};
use crate::config::{PldlConfig, SpotifyConfig, YtdlpConfig};
use crate::provider::Provider;
use crate::retry::BackendError;
use crate::task_db::Playlist;

/// Characters of combined tool output kept in error messages.
const OUTPUT_TAIL_CHARS: usize = 800;

fn output_tail(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout = String::from_utf8_lossy(&out.stdout);
    let combined = [stderr.trim(), stdout.trim()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let count = combined.chars().count();
    combined
        .chars()
        .skip(count.saturating_sub(OUTPUT_TAIL_CHARS))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ProcessBackend {
    ytdlp: YtdlpConfig,
    spotify: SpotifyConfig,
    cookie_file: Option<PathBuf>,
}

impl ProcessBackend {
    pub fn new(ytdlp: YtdlpConfig, spotify: SpotifyConfig) -> Self {
        Self {
            ytdlp,
            spotify,
            cookie_file: None,
        }
    }

    pub fn with_cookie_file(mut self, cookie_file: Option<PathBuf>) -> Self {
        self.cookie_file = cookie_file;
        self
    }

    /// Build from config, materializing the cookie jar (if any) under `state_dir`.
    pub async fn from_config(cfg: &PldlConfig, state_dir: &Path) -> Result<Self> {
        let cookie_file = prepare_cookie_file(&cfg.ytdlp, state_dir).await?;
        Ok(Self::new(cfg.ytdlp.clone(), cfg.spotify.clone()).with_cookie_file(cookie_file))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp.subprocess_timeout_secs.max(1))
    }

    fn spotify_env(&self) -> Result<Vec<(&'static str, String)>, BackendError> {
        let id = self.spotify.client_id.clone().filter(|s| !s.is_empty());
        let secret = self.spotify.client_secret.clone().filter(|s| !s.is_empty());
        match (id, secret) {
            (Some(id), Some(secret)) => Ok(vec![
                ("SPOTIPY_CLIENT_ID", id),
                ("SPOTIPY_CLIENT_SECRET", secret),
            ]),
            _ => Err(BackendError::Config(
                "Spotify requires spotify.client_id and spotify.client_secret".to_string(),
            )),
        }
    }

    /// Run a tool to completion with the subprocess timeout. The child is
    /// killed if the timeout fires.
    async fn run_tool(
        &self,
        program: &str,
        args: &[String],
        env: &[(&'static str, String)],
        cwd: Option<&Path>,
    ) -> Result<Output, BackendError> {
        tracing::debug!(program, ?args, "spawning tool");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (k, v) in env {
            cmd.env(k, v);
        }
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        let child = cmd.spawn().map_err(|source| BackendError::Spawn {
            tool: program.to_string(),
            source,
        })?;

        let timeout = self.timeout();
        let out = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(res) => res?,
            Err(_) => {
                return Err(BackendError::TimedOut {
                    tool: program.to_string(),
                    secs: timeout.as_secs(),
                })
            }
        };
        if !out.status.success() {
            return Err(BackendError::Exited {
                tool: program.to_string(),
                code: out.status.code(),
                output: output_tail(&out),
            });
        }
        Ok(out)
    }

    async fn spotify_metadata(&self, url: &str) -> Result<Playlist, BackendError> {
        let env = self.spotify_env()?;
        let dir = tempfile::tempdir()?;
        let save_file = dir.path().join("playlist.spotdl");
        self.run_tool(
            &self.spotify.binary,
            &args::spotdl_save(url, &save_file),
            &env,
            Some(dir.path()),
        )
        .await?;
        let json = tokio::fs::read_to_string(&save_file).await?;
        parse_spotdl_save(&json, url)
    }
}

#[async_trait]
impl DownloadBackend for ProcessBackend {
    async fn fetch_metadata(&self, url: &str) -> Result<Playlist, BackendError> {
        if Provider::detect(url) == Provider::Spotify {
            return self.spotify_metadata(url).await;
        }
        let out = self
            .run_tool(
                &self.ytdlp.binary,
                &args::ytdlp_metadata(&self.ytdlp, self.cookie_file.as_deref(), url),
                &[],
                None,
            )
            .await?;
        parse_ytdlp_flat(&String::from_utf8_lossy(&out.stdout), url)
    }

    async fn download(
        &self,
        job: &DownloadJob,
        identity: &ClientIdentity,
    ) -> Result<(), BackendError> {
        let cookies = self.cookie_file.as_deref();
        match &job.request {
            FetchRequest::Tool { .. } => {
                let env = self.spotify_env()?;
                let args = args::spotdl_download(&self.ytdlp, cookies, job, identity);
                self.run_tool(&self.spotify.binary, &args, &env, Some(&job.output_dir))
                    .await?;
            }
            FetchRequest::Direct { .. } | FetchRequest::Search { .. } => {
                let args = args::ytdlp_download(&self.ytdlp, cookies, job, identity);
                self.run_tool(&self.ytdlp.binary, &args, &[], Some(&job.output_dir))
                    .await?;
            }
        }
        Ok(())
    }
}
