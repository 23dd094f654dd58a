//! Command-line construction for yt-dlp and spotdl.

use std::path::Path;

use super::identity::ClientIdentity;
use super::{DownloadJob, FetchRequest};
use crate::config::YtdlpConfig;

fn push(args: &mut Vec<String>, flag: &str, value: impl ToString) {
    args.push(flag.to_string());
    args.push(value.to_string());
}

/// yt-dlp flags shared by every invocation: pacing, retries, identity, cookies.
fn runtime_args(cfg: &YtdlpConfig, cookie_file: Option<&Path>, identity: &ClientIdentity) -> Vec<String> {
    let mut args = Vec::new();

    push(&mut args, "--socket-timeout", cfg.socket_timeout_secs);
    if cfg.sleep_interval_secs > 0.0 {
        push(&mut args, "--sleep-interval", cfg.sleep_interval_secs);
    }
    if cfg.max_sleep_interval_secs > 0.0 {
        push(&mut args, "--max-sleep-interval", cfg.max_sleep_interval_secs);
    }
    if cfg.sleep_interval_requests > 0 {
        push(&mut args, "--sleep-requests", cfg.sleep_interval_requests);
    }
    if cfg.retries > 0 {
        push(&mut args, "--retries", cfg.retries);
    }
    if cfg.fragment_retries > 0 {
        push(&mut args, "--fragment-retries", cfg.fragment_retries);
    }
    if cfg.extractor_retries > 0 {
        push(&mut args, "--extractor-retries", cfg.extractor_retries);
    }

    let mut youtube_args = Vec::new();
    let client = identity
        .player_client
        .as_deref()
        .or(cfg.player_client.as_deref())
        .filter(|c| !c.is_empty());
    if let Some(client) = client {
        youtube_args.push(format!("player_client={client}"));
    }
    if let Some(token) = cfg.po_token.as_deref().filter(|t| !t.is_empty()) {
        youtube_args.push(format!("po_token={}+{}", cfg.po_provider, token));
    }
    if !youtube_args.is_empty() {
        push(&mut args, "--extractor-args", format!("youtube:{}", youtube_args.join(";")));
    }

    if let Some(ua) = &identity.user_agent {
        push(&mut args, "--user-agent", ua);
    }
    if !cfg.accept_language.is_empty() {
        push(&mut args, "--add-header", format!("Accept-Language:{}", cfg.accept_language));
    }
    if let Some(proxy) = &identity.proxy {
        push(&mut args, "--proxy", proxy);
    }
    if let Some(cookies) = cookie_file {
        push(&mut args, "--cookies", cookies.display());
    }
    if cfg.use_oauth {
        push(&mut args, "--username", "oauth2");
        push(&mut args, "--password", "");
    }
    args
}

/// `yt-dlp -x` for a direct URL or a `ytsearch1:` query.
pub(super) fn ytdlp_download(
    cfg: &YtdlpConfig,
    cookie_file: Option<&Path>,
    job: &DownloadJob,
    identity: &ClientIdentity,
) -> Vec<String> {
    let target = match &job.request {
        FetchRequest::Direct { url } | FetchRequest::Tool { url } => url.clone(),
        FetchRequest::Search { query } => format!("ytsearch1:{query}"),
    };
    let mut args = vec![
        "--extract-audio".to_string(),
        "--audio-format".to_string(),
        job.format.clone(),
        "--audio-quality".to_string(),
        "0".to_string(),
        "--no-playlist".to_string(),
        "--no-progress".to_string(),
        "--no-overwrites".to_string(),
    ];
    push(
        &mut args,
        "--output",
        job.output_dir.join(&job.output_template).display(),
    );
    args.extend(runtime_args(cfg, cookie_file, identity));
    args.push("--".to_string());
    args.push(target);
    args
}

/// `yt-dlp --flat-playlist -J` for playlist resolution.
pub(super) fn ytdlp_metadata(cfg: &YtdlpConfig, cookie_file: Option<&Path>, url: &str) -> Vec<String> {
    let mut args = vec![
        "--flat-playlist".to_string(),
        "--dump-single-json".to_string(),
        "--no-warnings".to_string(),
    ];
    push(&mut args, "--socket-timeout", cfg.socket_timeout_secs);
    if let Some(cookies) = cookie_file {
        push(&mut args, "--cookies", cookies.display());
    }
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// `spotdl download`; yt-dlp settings are forwarded through `--yt-dlp-args`.
pub(super) fn spotdl_download(
    cfg: &YtdlpConfig,
    cookie_file: Option<&Path>,
    job: &DownloadJob,
    identity: &ClientIdentity,
) -> Vec<String> {
    let url = match &job.request {
        FetchRequest::Direct { url } | FetchRequest::Tool { url } => url.clone(),
        FetchRequest::Search { query } => query.clone(),
    };
    let mut args = vec!["download".to_string(), url];
    push(
        &mut args,
        "--output",
        job.output_dir.join(&job.output_template).display(),
    );
    push(&mut args, "--overwrite", "skip");
    push(&mut args, "--format", &job.format);
    args.push("--simple-tui".to_string());
    if let Some(cookies) = cookie_file {
        push(&mut args, "--cookie-file", cookies.display());
    }

    // spotdl splits this string on whitespace, so values with spaces
    // (user agents) are dropped rather than mangled.
    let forwarded: Vec<String> = runtime_args(cfg, None, identity)
        .chunks(2)
        .filter(|pair| pair.iter().all(|v| !v.contains(' ')))
        .flat_map(|pair| pair.to_vec())
        .collect();
    if !forwarded.is_empty() {
        push(&mut args, "--yt-dlp-args", forwarded.join(" "));
    }
    args
}

/// `spotdl save` writes the playlist's track list as JSON.
pub(super) fn spotdl_save(url: &str, save_file: &Path) -> Vec<String> {
    vec![
        "save".to_string(),
        url.to_string(),
        "--save-file".to_string(),
        save_file.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn job(request: FetchRequest) -> DownloadJob {
        DownloadJob {
            request,
            output_dir: PathBuf::from("/tmp/stage"),
            output_template: "Song.%(ext)s".into(),
            format: "mp3".into(),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn search_requests_use_ytsearch() {
        let args = ytdlp_download(
            &YtdlpConfig::default(),
            None,
            &job(FetchRequest::Search {
                query: "Band - Song audio".into(),
            }),
            &ClientIdentity::default(),
        );
        assert_eq!(args.last().unwrap(), "ytsearch1:Band - Song audio");
        assert_eq!(value_after(&args, "--output"), Some("/tmp/stage/Song.%(ext)s"));
        assert_eq!(value_after(&args, "--audio-format"), Some("mp3"));
    }

    #[test]
    fn rotation_client_overrides_default_and_merges_po_token() {
        let cfg = YtdlpConfig {
            po_token: Some("TOKEN".into()),
            ..Default::default()
        };
        let identity = ClientIdentity {
            player_client: Some("android".into()),
            user_agent: Some("UA".into()),
            proxy: Some("http://p:1".into()),
        };
        let args = ytdlp_download(
            &cfg,
            Some(Path::new("/tmp/cookies.txt")),
            &job(FetchRequest::Direct {
                url: "https://youtu.be/x".into(),
            }),
            &identity,
        );
        assert_eq!(
            value_after(&args, "--extractor-args"),
            Some("youtube:player_client=android;po_token=web+TOKEN")
        );
        assert_eq!(value_after(&args, "--proxy"), Some("http://p:1"));
        assert_eq!(value_after(&args, "--user-agent"), Some("UA"));
        assert_eq!(value_after(&args, "--cookies"), Some("/tmp/cookies.txt"));
    }

    #[test]
    fn default_identity_uses_configured_client() {
        let args = ytdlp_metadata(&YtdlpConfig::default(), None, "https://youtu.be/x");
        assert!(args.contains(&"--flat-playlist".to_string()));
        let dl = ytdlp_download(
            &YtdlpConfig::default(),
            None,
            &job(FetchRequest::Direct { url: "u".into() }),
            &ClientIdentity::default(),
        );
        assert_eq!(
            value_after(&dl, "--extractor-args"),
            Some("youtube:player_client=ios")
        );
    }

    #[test]
    fn spotdl_forwards_space_free_args_only() {
        let identity = ClientIdentity {
            player_client: Some("tv".into()),
            user_agent: Some("Mozilla/5.0 (X11; Linux)".into()),
            proxy: None,
        };
        let args = spotdl_download(
            &YtdlpConfig::default(),
            None,
            &job(FetchRequest::Tool {
                url: "https://open.spotify.com/track/1".into(),
            }),
            &identity,
        );
        assert_eq!(args[0], "download");
        let forwarded = value_after(&args, "--yt-dlp-args").unwrap();
        assert!(forwarded.contains("--extractor-args youtube:player_client=tv"));
        assert!(!forwarded.contains("Mozilla"));
        assert!(forwarded.contains("Accept-Language:en-US,en;q=0.9"));
    }
}
