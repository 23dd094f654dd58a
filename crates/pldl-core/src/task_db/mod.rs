//! Persistent task database (SQLite via sqlx).
//!
//! Stores one row per task: lifecycle status, progress, the resolved playlist
//! and user options as JSON, the cancel-requested flag and the artifact path.

mod db;
mod record;
mod store;
mod types;

mod tasks {
    mod read;
    mod write;

    pub use write::INTERRUPTED_MESSAGE;
}

pub use db::TaskDb;
pub use record::TaskRecord;
pub use store::TaskStore;
pub use tasks::INTERRUPTED_MESSAGE;
pub use types::*;

#[cfg(test)]
pub(crate) use db::open_memory;

#[cfg(test)]
mod tests;
