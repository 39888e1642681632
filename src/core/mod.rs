// Public modules
pub mod cache;
pub mod config;
pub mod defaults;
pub mod deploy;
pub mod error;
pub mod git;
pub mod maintenance;
pub mod paths;
pub mod pipeline;
pub mod provision;
pub mod release;
pub mod runner;
pub mod schedule;
pub mod verify;
pub mod workflow;

// Re-export common types for convenience
pub use error::{Error, ErrorCode, Result};
