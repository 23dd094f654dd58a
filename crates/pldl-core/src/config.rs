use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Client-identity rotation used when a provider answers with a bot-check
/// or rate limit (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Alternate player clients tried after the default identity, in order.
    pub player_clients: Vec<String>,
    /// Backoff before identity `i + 1` is `backoff_base_secs * (i + 1)`.
    pub backoff_base_secs: f64,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            player_clients: ["ios", "android", "web", "tv"]
                .into_iter()
                .map(String::from)
                .collect(),
            backoff_base_secs: 2.0,
        }
    }
}

/// yt-dlp invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YtdlpConfig {
    pub binary: String,
    /// Player client used by the default identity (None = let yt-dlp decide).
    pub player_client: Option<String>,
    /// Proxy pool; one entry is picked at random per attempt.
    pub proxies: Vec<String>,
    /// User-agent pool; one entry is picked at random per attempt.
    pub user_agents: Vec<String>,
    pub accept_language: String,
    pub po_token: Option<String>,
    pub po_provider: String,
    pub use_oauth: bool,
    /// Netscape cookie file on disk.
    pub cookies_path: Option<PathBuf>,
    /// Base64-encoded cookie file contents.
    pub cookies_b64: Option<String>,
    /// http(s) URL serving a cookie file.
    pub cookies_url: Option<String>,
    pub sleep_interval_secs: f64,
    pub max_sleep_interval_secs: f64,
    pub sleep_interval_requests: u32,
    pub retries: u32,
    pub fragment_retries: u32,
    pub extractor_retries: u32,
    pub socket_timeout_secs: u64,
    /// Hard limit on one yt-dlp/spotdl process.
    pub subprocess_timeout_secs: u64,
}

impl Default for YtdlpConfig {
    fn default() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            player_client: Some("ios".to_string()),
            proxies: Vec::new(),
            user_agents: Vec::new(),
            accept_language: "en-US,en;q=0.9".to_string(),
            po_token: None,
            po_provider: "web".to_string(),
            use_oauth: false,
            cookies_path: None,
            cookies_b64: None,
            cookies_url: None,
            sleep_interval_secs: 1.0,
            max_sleep_interval_secs: 3.0,
            sleep_interval_requests: 1,
            retries: 5,
            fragment_retries: 5,
            extractor_retries: 3,
            socket_timeout_secs: 30,
            subprocess_timeout_secs: 300,
        }
    }
}

/// Spotify playlists: metadata and optional spotdl-backed downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    /// Try spotdl first and fall back to a search on no output.
    pub use_spotdl: bool,
    pub binary: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            use_spotdl: false,
            binary: "spotdl".to_string(),
            client_id: None,
            client_secret: None,
        }
    }
}

/// Global configuration loaded from `~/.config/pldl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PldlConfig {
    /// Track downloads running at once across all tasks and owners.
    pub max_concurrent_tracks: usize,
    /// Queued/downloading tasks allowed per owner before `start` is refused.
    pub max_running_tasks_per_owner: u64,
    /// Unfinished tasks allowed per owner before `prepare` is refused.
    pub max_queued_tasks_per_owner: u64,
    /// Where finished artifacts land (None = `~/.local/share/pldl/downloads`).
    pub artifact_dir: Option<PathBuf>,
    pub progress_save_interval_ms: u64,
    pub cancel_check_interval_ms: u64,
    /// Pause after a track finally fails on a bot-check/rate limit.
    pub throttle_backoff_secs: u64,
    pub rotation: RotationConfig,
    pub ytdlp: YtdlpConfig,
    pub spotify: SpotifyConfig,
}

impl Default for PldlConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tracks: 1,
            max_running_tasks_per_owner: 1,
            max_queued_tasks_per_owner: 2,
            artifact_dir: None,
            progress_save_interval_ms: 1000,
            cancel_check_interval_ms: 1000,
            throttle_backoff_secs: 30,
            rotation: RotationConfig::default(),
            ytdlp: YtdlpConfig::default(),
            spotify: SpotifyConfig::default(),
        }
    }
}

impl PldlConfig {
    /// Configured artifact directory, or the XDG data default.
    pub fn artifact_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.artifact_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("pldl")?;
        Ok(xdg_dirs.get_data_home().join("downloads"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pldl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PldlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PldlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PldlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
