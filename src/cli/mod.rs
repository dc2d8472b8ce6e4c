//! Command-line interface.
//!
//! Argument parsing lives in [`args`]; the thin command implementations in
//! [`commands`]. The engine modules never depend on anything here.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
pub use commands::dispatch;
