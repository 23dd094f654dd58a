//! Rotation loop: try each client identity until success, a fatal error,
//! cancellation, or exhaustion.

use async_trait::async_trait;
use std::future::Future;

use super::error::BackendError;
use super::policy::{ErrorKind, RetryDecision, RotationPolicy};
use crate::scheduler::CancellationGate;

/// Result of rotating through client identities for one track.
#[derive(Debug)]
pub enum RotationOutcome<T> {
    Success(T),
    /// Cancellation was observed before an attempt; no further attempts made.
    Cancelled,
    /// Non-retryable failure; rotation stopped early.
    Fatal(BackendError),
    /// Every identity failed with a retryable error; carries the last one.
    Exhausted(BackendError),
}

/// Hears about each retryable failure before the backoff sleep starts.
#[async_trait]
pub trait RotationListener: Send + Sync {
    /// `next_client` is the identity the following attempt will use
    /// (`None` for the default client).
    async fn rotating(&self, next_client: Option<&str>, kind: ErrorKind, cause: &BackendError);
}

/// Listener for callers with nowhere to report rotation.
pub struct SilentRotation;

#[async_trait]
impl RotationListener for SilentRotation {
    async fn rotating(&self, _next_client: Option<&str>, _kind: ErrorKind, _cause: &BackendError) {}
}

/// Runs `attempt(index, player_client)` for each identity in `policy`.
///
/// The gate is checked before every attempt. Retryable failures are passed
/// to `listener` and then sleep for the policy backoff before the next
/// identity; the last identity does not sleep.
pub async fn run_with_rotation<T, F, Fut>(
    policy: &RotationPolicy,
    gate: &CancellationGate,
    classify: fn(&BackendError) -> ErrorKind,
    listener: &dyn RotationListener,
    mut attempt: F,
) -> RotationOutcome<T>
where
    F: FnMut(usize, Option<String>) -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut index = 0usize;
    loop {
        if gate.should_cancel().await {
            return RotationOutcome::Cancelled;
        }
        let client = policy.clients.get(index).cloned().flatten();
        let err = match attempt(index, client.clone()).await {
            Ok(v) => return RotationOutcome::Success(v),
            Err(e) => e,
        };
        let kind = classify(&err);
        match policy.decide(index, kind) {
            RetryDecision::NoRetry => return RotationOutcome::Fatal(err),
            RetryDecision::Exhausted => {
                tracing::warn!(attempts = index + 1, "all client identities failed: {}", err);
                return RotationOutcome::Exhausted(err);
            }
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(
                    client = client.as_deref().unwrap_or("default"),
                    ?kind,
                    ?delay,
                    "rotating client identity: {}",
                    err
                );
                let next = policy.clients.get(index + 1).cloned().flatten();
                listener.rotating(next.as_deref(), kind, &err).await;
                tokio::time::sleep(delay).await;
                index += 1;
            }
        }
    }
}
