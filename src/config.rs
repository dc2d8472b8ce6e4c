//! Engine configuration.
//!
//! [`EngineConfig`] carries every knob the resolution machinery needs —
//! directories, search paths, install policy — and is constructed once per
//! run and threaded by reference through every call. There is no
//! process-wide state.

use std::path::{Path, PathBuf};

/// Default base URL for the language package index, using the
/// `packages/source/<initial>/<name>/` layout.
pub const DEFAULT_INDEX_URL: &str = "https://pypi.python.org/packages/source";

/// Configuration for one resolution run.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Where locally-built prerequisites and logs live.
    pub build_dir: PathBuf,
    /// Shared download cache for fetched archives.
    pub download_dir: PathBuf,
    /// Where language-index packages are diverted in local mode.
    pub local_lib_dir: PathBuf,
    /// System-wide install prefix for non-local installs.
    pub global_prefix: PathBuf,
    /// Local install prefixes that have succeeded, consulted by every
    /// unlimited search. Persisted across runs via the configuration cache.
    pub search_paths: Vec<PathBuf>,
    /// Directory of user-supplied provider override definitions.
    pub override_dir: Option<PathBuf>,
    /// Base URL of the language package index.
    pub index_url: String,
    /// Whether missing prerequisites may be installed (false = check only).
    pub install: bool,
    /// Install into the build tree's private prefix rather than system-wide.
    pub install_locally: bool,
}

impl EngineConfig {
    /// Configuration rooted at a build directory, with conventional
    /// defaults for everything else.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        let build_dir = build_dir.into();
        let local_lib_dir = build_dir.join("lib");
        Self {
            build_dir,
            download_dir: PathBuf::from("third_party"),
            local_lib_dir,
            global_prefix: PathBuf::from("/usr"),
            search_paths: Vec::new(),
            override_dir: None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            install: true,
            install_locally: true,
        }
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_override_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = url.into();
        self
    }

    /// The build tree's private install prefix, absolute.
    pub fn local_prefix(&self) -> PathBuf {
        self.build_dir
            .canonicalize()
            .unwrap_or_else(|_| self.build_dir.clone())
    }

    /// Log file for an external tool run on behalf of a dependency.
    pub fn log_path(&self, name: &str) -> PathBuf {
        self.build_dir.join(format!("{name}.log"))
    }

    /// Path of the persisted configuration cache record.
    pub fn cache_path(&self) -> PathBuf {
        self.build_dir.join(".cache.json")
    }

    /// Record a local install prefix for future searches, skipping
    /// duplicates.
    pub fn add_search_path(&mut self, path: &Path) {
        if !self.search_paths.iter().any(|p| p == path) {
            self.search_paths.push(path.to_path_buf());
        }
    }
}
