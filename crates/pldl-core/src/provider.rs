//! Provider detection from a playlist URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Where a playlist comes from. Decides which track strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Spotify,
    Youtube,
    Soundcloud,
    #[default]
    Generic,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Spotify => "spotify",
            Provider::Youtube => "youtube",
            Provider::Soundcloud => "soundcloud",
            Provider::Generic => "generic",
        }
    }

    /// Classify a URL by host. Unparseable input is treated as generic.
    pub fn detect(url: &str) -> Self {
        let url = url.trim();
        if url.starts_with("spotify:") {
            return Provider::Spotify;
        }
        let Ok(parsed) = Url::parse(url) else {
            return Provider::Generic;
        };
        let Some(host) = parsed.host_str() else {
            return Provider::Generic;
        };
        let host = host.to_ascii_lowercase();
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));
        if matches("spotify.com") {
            Provider::Spotify
        } else if matches("youtube.com") || matches("youtu.be") {
            Provider::Youtube
        } else if matches("soundcloud.com") {
            Provider::Soundcloud
        } else {
            Provider::Generic
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
