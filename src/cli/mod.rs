//! CLI module for the managed delivery tool.
//!
//! This module provides the command-line interface for editing, checking
//! and publishing delivery configs.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
