//! Scheduling primitives shared by every download run.
//!
//! Two independent pools bound the work: one slot per owner
//! ([`OwnerScheduler`]) and a global number of concurrent track downloads
//! ([`CapacityLimiter`]). Runs poll a [`CancellationGate`] and report through
//! a [`ProgressAggregator`].

mod cancel;
mod capacity;
mod owner;
mod progress;

pub use cancel::CancellationGate;
pub use capacity::{CapacityLimiter, CapacityPermit};
pub use owner::{owner_key, OwnerGuard, OwnerScheduler, UNKNOWN_OWNER};
pub use progress::{ProgressAggregator, ProgressSnapshot, DOWNLOAD_PHASE_CEILING};
