//! Command-line interface module
//!
//! Provides argument parsing and the build pipeline entry point.

pub mod args;
pub mod commands;

pub use args::{Args, parse_args};
pub use commands::execute;
