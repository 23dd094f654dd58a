//! CLI command handlers. Each command is in its own file.

mod cancel;
mod checksum;
mod get;
mod history;
mod prepare;
mod recover;
mod remove;
mod start;
mod status;
mod wait;

pub use cancel::run_cancel;
pub use checksum::run_checksum;
pub use get::run_get;
pub use history::run_history;
pub use prepare::run_prepare;
pub use recover::run_recover;
pub use remove::run_remove;
pub use start::run_start;
pub use status::run_status;
