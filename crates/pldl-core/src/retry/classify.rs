//! Classify backend failures by scanning tool output for provider signals.

use super::error::BackendError;
use super::policy::ErrorKind;

const BOT_CHECK_MARKERS: &[&str] = &[
    "confirm you",
    "not a bot",
    "sign in to confirm",
    "captcha",
];

const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "too many requests",
    "rate limit",
    "rate-limit",
    "ratelimit",
];

fn scan(output: &str) -> Option<ErrorKind> {
    let lower = output.to_lowercase();
    if BOT_CHECK_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(ErrorKind::BotCheck);
    }
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(ErrorKind::RateLimited);
    }
    None
}

/// Classification for extractor and search calls: only explicit
/// bot-check/rate-limit signals are retryable.
pub fn classify(e: &BackendError) -> ErrorKind {
    match e {
        BackendError::Exited { output, .. } => scan(output).unwrap_or(ErrorKind::Other),
        BackendError::NoOutput { .. } => ErrorKind::NoOutput,
        _ => ErrorKind::Other,
    }
}

/// Classification for the metadata-driven tool path: any unsuccessful exit
/// is worth another identity. Launch failures, timeouts and configuration
/// errors stay fatal.
pub fn classify_tool(e: &BackendError) -> ErrorKind {
    match e {
        BackendError::Exited { output, .. } => scan(output).unwrap_or(ErrorKind::ToolExit),
        other => classify(other),
    }
}
