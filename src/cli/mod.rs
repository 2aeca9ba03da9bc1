//! CLI module for filament-train
//!
//! This module contains the command handlers and logging setup.

mod commands;
mod logging;

pub use commands::run_command;
pub use logging::{init_tracing, LogLevel};

// Re-export Cli from config for convenience
pub use crate::config::Cli;
