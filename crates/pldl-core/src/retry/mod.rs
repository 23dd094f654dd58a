//! Client-identity rotation and failure classification.
//!
//! Backend failures are classified into retryable bot-check/rate-limit
//! signals and fatal errors. Retryable failures move on to the next client
//! identity after a growing backoff; fatal ones stop the track immediately.

mod classify;
mod error;
mod policy;
mod run;

pub use classify::{classify, classify_tool};
pub use error::BackendError;
pub use policy::{ErrorKind, RetryDecision, RotationPolicy};
pub use run::{run_with_rotation, RotationListener, RotationOutcome, SilentRotation};
