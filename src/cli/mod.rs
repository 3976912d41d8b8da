//! CLI module for hilstress - command-line interface.

pub mod commands;

pub use commands::Cli;
