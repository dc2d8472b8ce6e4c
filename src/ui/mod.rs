//! Terminal output helpers.
//!
//! Thin styling layer over [`console`]: status lines for the resolution
//! walk and a download progress bar in [`progress`]. Everything degrades to
//! plain text when the stream is not a terminal.

pub mod progress;

use console::style;

/// Print a normal status line.
pub fn status(message: &str) {
    println!("{message}");
}

/// Print a step heading (dependency being checked or installed).
pub fn heading(message: &str) {
    println!("{}", style(message).bold());
}

/// Print a success note.
pub fn success(message: &str) {
    println!("{} {message}", style("ok").green().bold());
}

/// Print a warning to stderr.
pub fn warn(message: &str) {
    eprintln!("{} {message}", style("warning:").yellow().bold());
}

/// Print an error to stderr.
pub fn error(message: &str) {
    eprintln!("{} {message}", style("error:").red().bold());
}
