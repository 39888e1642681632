//! Generic utility primitives with zero domain knowledge.
//!
//! - `artifact` - Locating build outputs by filename prefix
//! - `io` - File I/O with consistent error handling
//! - `shell` - Shell escaping and quoting
//! - `template` - String template rendering

pub mod artifact;
pub mod io;
pub mod shell;
pub mod template;
