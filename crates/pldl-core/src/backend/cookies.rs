//! Cookie jars for yt-dlp/spotdl: a file on disk, inline base64, or a URL.
//!
//! Remote jars are fetched with libcurl on a blocking thread.

use anyhow::{Context, Result};
use base64::Engine;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::config::YtdlpConfig;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_COOKIE_BYTES: usize = 5 * 1024 * 1024;
const COOKIE_FILE_NAME: &str = "cookies.txt";

/// Resolve the configured cookie source into a file path.
///
/// Precedence: `cookies_path`, then `cookies_b64`, then `cookies_url`.
/// Inline and remote jars are written to `dir/cookies.txt`.
pub async fn prepare_cookie_file(cfg: &YtdlpConfig, dir: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = &cfg.cookies_path {
        if path.is_file() {
            return Ok(Some(path.clone()));
        }
        tracing::warn!(path = %path.display(), "cookies_path does not exist; ignoring");
    }

    let contents = if let Some(b64) = cfg.cookies_b64.as_deref().filter(|s| !s.trim().is_empty()) {
        base64::engine::general_purpose::STANDARD
            .decode(b64.trim())
            .context("decode cookies_b64")?
    } else if let Some(url) = cfg.cookies_url.as_deref().filter(|s| !s.trim().is_empty()) {
        let url = url.trim().to_string();
        tokio::task::spawn_blocking(move || fetch_cookie_jar(&url))
            .await
            .context("cookie fetch task")??
    } else {
        return Ok(None);
    };

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(COOKIE_FILE_NAME);
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    tracing::debug!(path = %path.display(), "cookie jar prepared");
    Ok(Some(path))
}

/// Download a cookie jar over http(s). Blocking; call from `spawn_blocking`.
pub fn fetch_cookie_jar(url: &str) -> Result<Vec<u8>> {
    let parsed = Url::parse(url).context("invalid cookies_url")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("cookies_url must be http or https, got {}", parsed.scheme());
    }

    let mut body: Vec<u8> = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(10))?;
    easy.timeout(FETCH_TIMEOUT)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            if body.len() + data.len() > MAX_COOKIE_BYTES {
                // Returning a short count aborts the transfer.
                return Ok(0);
            }
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform().context("cookie download failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("cookie download returned HTTP {}", code);
    }
    Ok(body)
}
