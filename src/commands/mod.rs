//! Command handlers
//!
//! Each CLI subcommand delegates to a handler here, keeping `main.rs` to
//! argument parsing and dispatch.

pub mod serve;
pub mod sessions;
