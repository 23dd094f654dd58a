//! Filename sanitization and track filename templates.

use crate::task_db::Track;

/// Longest sanitized name, in characters.
const MAX_NAME_CHARS: usize = 200;

/// Fallback when a name sanitizes to nothing.
const UNTITLED: &str = "untitled";

/// Audio extensions recognized as real output.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "wav", "opus", "ogg", "aac", "webm"];

/// Sanitizes a provider- or user-supplied name for use as a filename.
///
/// - Drops `<>:"/\|?*` and control characters
/// - Trims surrounding whitespace and dots
/// - Limits length to 200 characters
/// - Returns `"untitled"` when nothing usable remains
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .filter(|c| !c.is_control())
        .collect();
    let trimmed = cleaned.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        return UNTITLED.to_string();
    }
    trimmed.chars().take(MAX_NAME_CHARS).collect::<String>().trim_end().to_string()
}

/// True if `name` ends in one of [`AUDIO_EXTENSIONS`] (case-insensitive).
pub fn is_audio_name(name: &str) -> bool {
    let Some((_, ext)) = name.rsplit_once('.') else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Render the user's filename template for one track (without extension).
///
/// Placeholders: `{title}`, `{artist}`, `{album}`, `{year}`, `{track_number}`.
/// Multi-track runs get ` - {track_number}` appended when the template lacks
/// it so names stay unique and ordered.
pub fn render_track_name(template: &str, track: &Track, total: usize) -> String {
    let mut template = if template.trim().is_empty() {
        "{title}".to_string()
    } else {
        template.to_string()
    };
    if total > 1 && !template.contains("{track_number}") {
        template.push_str(" - {track_number}");
    }
    let number = track
        .download_index
        .map(|n| format!("{:02}", n))
        .unwrap_or_default();
    let rendered = template
        .replace("{title}", &track.title)
        .replace("{artist}", &track.artist)
        .replace("{album}", track.album.as_deref().unwrap_or(""))
        .replace("{year}", track.year.as_deref().unwrap_or(""))
        .replace("{track_number}", &number);
    sanitize_filename(&rendered)
}

/// Escape a literal for use inside a yt-dlp output template.
pub fn escape_output_template(literal: &str) -> String {
    literal.replace('%', "%%")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, index: u32) -> Track {
        Track {
            title: title.into(),
            artist: "Band".into(),
            download_index: Some(index),
            ..Default::default()
        }
    }

    #[test]
    fn strips_reserved_characters() {
        assert_eq!(sanitize_filename("AC/DC: Back <In> Black?"), "ACDC Back In Black");
        assert_eq!(sanitize_filename("a\\b|c*d\"e"), "abcde");
    }

    #[test]
    fn empty_becomes_untitled() {
        assert_eq!(sanitize_filename("  ..//.. "), "untitled");
        assert_eq!(sanitize_filename(""), "untitled");
    }

    #[test]
    fn caps_length() {
        let long = "x".repeat(500);
        assert_eq!(sanitize_filename(&long).chars().count(), 200);
    }

    #[test]
    fn recognizes_audio_names() {
        assert!(is_audio_name("song.MP3"));
        assert!(is_audio_name("001 - a.b.opus"));
        assert!(!is_audio_name("cover.jpg"));
        assert!(!is_audio_name("noext"));
    }

    #[test]
    fn single_track_template_is_used_verbatim() {
        assert_eq!(render_track_name("{title}", &track("Song", 1), 1), "Song");
        assert_eq!(
            render_track_name("{artist} - {title}", &track("Song", 1), 1),
            "Band - Song"
        );
    }

    #[test]
    fn multi_track_appends_number() {
        assert_eq!(render_track_name("{title}", &track("Song", 3), 12), "Song - 03");
        assert_eq!(
            render_track_name("{track_number}. {title}", &track("Song", 3), 12),
            "03. Song"
        );
    }

    #[test]
    fn escapes_percent() {
        assert_eq!(escape_output_template("100% Hits"), "100%% Hits");
    }
}
