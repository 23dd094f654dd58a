pub mod config;
pub mod error;
pub mod logging;

// Core modules
pub mod artifact;
pub mod backend;
pub mod checksum;
pub mod naming;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod service;
pub mod strategy;
pub mod task_db;

pub use error::PldlError;
