//! Parse tool metadata output into a [`Playlist`].
//!
//! Parsing is lenient: entries keep whatever fields the tool supplied and
//! missing values become empty strings. Dropping unplayable tracks is the
//! caller's decision.

use serde_json::Value;

use crate::provider::Provider;
use crate::retry::BackendError;
use crate::task_db::{Playlist, Track};

fn str_field(v: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn opt_field(v: &Value, keys: &[&str]) -> Option<String> {
    let s = str_field(v, keys);
    (!s.is_empty()).then_some(s)
}

fn thumbnail(v: &Value) -> Option<String> {
    opt_field(v, &["thumbnail"]).or_else(|| {
        v.get("thumbnails")
            .and_then(Value::as_array)
            .and_then(|t| t.last())
            .and_then(|t| t.get("url"))
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn ytdlp_track(index: usize, entry: &Value, provider: Provider) -> Track {
    let id = opt_field(entry, &["id"]).unwrap_or_else(|| index.to_string());
    let mut url = str_field(entry, &["webpage_url", "url"]);
    if url.is_empty() && provider == Provider::Youtube && !id.is_empty() {
        url = format!("https://www.youtube.com/watch?v={id}");
    }
    Track {
        id,
        title: str_field(entry, &["title", "track"]),
        artist: str_field(entry, &["artist", "uploader", "channel", "creator"]),
        album: opt_field(entry, &["album"]),
        year: entry
            .get("release_year")
            .and_then(Value::as_u64)
            .map(|y| y.to_string()),
        url,
        ..Default::default()
    }
}

/// Parse `yt-dlp --flat-playlist -J` output. A single video (no `entries`)
/// becomes a one-track playlist.
pub fn parse_ytdlp_flat(json: &str, source_url: &str) -> Result<Playlist, BackendError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| BackendError::Metadata(format!("invalid yt-dlp JSON: {e}")))?;
    let provider = Provider::detect(source_url);

    let tracks: Vec<Track> = match root.get("entries").and_then(Value::as_array) {
        Some(entries) => entries
            .iter()
            .filter(|e| !e.is_null())
            .enumerate()
            .map(|(i, e)| ytdlp_track(i, e, provider))
            .collect(),
        None => {
            let mut track = ytdlp_track(0, &root, provider);
            if track.url.is_empty() {
                track.url = source_url.to_string();
            }
            vec![track]
        }
    };

    let title = opt_field(&root, &["title", "playlist_title"]).unwrap_or_else(|| "Playlist".to_string());
    Ok(Playlist {
        title,
        provider,
        tracks,
        cover_url: thumbnail(&root),
    })
}

/// Parse a `spotdl save` file: a JSON array of songs.
pub fn parse_spotdl_save(json: &str, source_url: &str) -> Result<Playlist, BackendError> {
    let root: Value = serde_json::from_str(json)
        .map_err(|e| BackendError::Metadata(format!("invalid spotdl JSON: {e}")))?;
    let songs = root
        .as_array()
        .ok_or_else(|| BackendError::Metadata("spotdl save file is not a list".to_string()))?;

    let tracks = songs
        .iter()
        .enumerate()
        .map(|(i, song)| {
            let artist = song
                .get("artists")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| str_field(song, &["artist"]));
            Track {
                id: opt_field(song, &["song_id"]).unwrap_or_else(|| i.to_string()),
                title: str_field(song, &["name"]),
                artist,
                album: opt_field(song, &["album_name"]),
                year: song
                    .get("year")
                    .and_then(|y| y.as_u64().map(|n| n.to_string()).or_else(|| y.as_str().map(str::to_string))),
                url: str_field(song, &["url"]),
                ..Default::default()
            }
        })
        .collect();

    let first = songs.first();
    let title = first
        .and_then(|s| opt_field(s, &["list_name"]))
        .unwrap_or_else(|| "Spotify playlist".to_string());
    Ok(Playlist {
        title,
        provider: Provider::detect(source_url),
        tracks,
        cover_url: first.and_then(|s| opt_field(s, &["cover_url"])),
    })
}
