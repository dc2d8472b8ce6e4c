//! Error types for cairn operations.
//!
//! This module defines [`CairnError`], the primary error type used throughout
//! the crate, and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - `NotFound` is an expected condition: search heuristics return it so
//!   callers can fall through to an install attempt. It is never used for
//!   control flow beyond that single fallback.
//! - `Install` and `VerificationFailed` are fatal for the run and always
//!   carry the dependency name; `Install` also points at the captured log.
//! - Use `anyhow::Error` (via `CairnError::Other`) for unexpected errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for cairn operations.
#[derive(Debug, Error)]
pub enum CairnError {
    /// Search for a program, header, or library exhausted all candidates.
    #[error("{name} not found")]
    NotFound { name: String },

    /// A download failed (non-2xx status, redirect loop, or short body).
    #[error("download failed for {url}{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Download {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// An archive could not be unpacked.
    #[error("cannot unpack {archive}: {message}")]
    Archive { archive: String, message: String },

    /// No provider could be resolved for a dependency name.
    #[error("no provider for dependency '{name}'")]
    NoProvider { name: String },

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency: {chain}")]
    CyclicDependency { chain: String },

    /// An external install tool failed; its full output is in the log.
    #[error("installation of '{dependency}' failed; see {}", log.display())]
    Install { dependency: String, log: PathBuf },

    /// An install reported success but the post-install check still fails.
    #[error("'{dependency}' installed but could not be verified")]
    VerificationFailed { dependency: String },

    /// A subprocess could not be spawned or exited nonzero.
    #[error("command failed with exit code {code:?}: {command}")]
    Command { command: String, code: Option<i32> },

    /// A provider override definition is malformed.
    #[error("invalid provider definition: {message}")]
    Config { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CairnError {
    /// Whether this error represents an expected "absent" condition that an
    /// install attempt can recover from.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CairnError::NotFound { .. })
    }
}

/// Result type alias for cairn operations.
pub type Result<T> = std::result::Result<T, CairnError>;
