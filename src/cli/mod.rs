//! CLI module for leoseg
//!
//! Command handlers and output helpers for the `leoseg` binary.

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};

// Re-export Cli from config for convenience
pub use crate::config::Cli;
