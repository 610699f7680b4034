//! Command-line interface
//!
//! Argument parsing and command handlers for the `greenwave` binary.

pub mod args;
pub mod commands;
