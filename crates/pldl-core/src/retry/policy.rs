use std::time::Duration;

use crate::config::RotationConfig;

/// Classification of a backend failure for rotation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Provider asked us to prove we are human.
    BotCheck,
    /// Provider is throttling (HTTP 429 and friends).
    RateLimited,
    /// External tool exited unsuccessfully on a path that treats every exit as transient.
    ToolExit,
    /// Backend "succeeded" without producing audio.
    NoOutput,
    /// Anything else; never retried.
    Other,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::BotCheck | ErrorKind::RateLimited | ErrorKind::ToolExit
        )
    }

    /// Failures that warrant a pause before the capacity slot is released.
    pub fn is_throttle(self) -> bool {
        matches!(self, ErrorKind::BotCheck | ErrorKind::RateLimited)
    }
}

/// Decision returned by the rotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Fatal for this track.
    NoRetry,
    /// Retry with the next identity after the given delay.
    RetryAfter(Duration),
    /// Retryable, but every identity has been tried.
    Exhausted,
}

/// Ordered client identities and linear backoff between them.
///
/// Entry 0 is always the default identity (`None`); configured alternates
/// follow in order.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    pub clients: Vec<Option<String>>,
    pub backoff_base: Duration,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

impl RotationPolicy {
    pub fn from_config(cfg: &RotationConfig) -> Self {
        let mut clients = vec![None];
        clients.extend(
            cfg.player_clients
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(|c| Some(c.to_string())),
        );
        let backoff_base =
            Duration::try_from_secs_f64(cfg.backoff_base_secs).unwrap_or(Duration::from_secs(2));
        Self {
            clients,
            backoff_base,
        }
    }

    /// Total attempts one track may consume.
    pub fn attempts(&self) -> usize {
        self.clients.len().max(1)
    }

    /// Delay before moving on from identity `index` (0-based).
    pub fn backoff(&self, index: usize) -> Duration {
        self.backoff_base
            .saturating_mul(u32::try_from(index + 1).unwrap_or(u32::MAX))
    }

    pub fn decide(&self, index: usize, kind: ErrorKind) -> RetryDecision {
        if !kind.is_retryable() {
            return RetryDecision::NoRetry;
        }
        if index + 1 >= self.attempts() {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.backoff(index))
    }
}
