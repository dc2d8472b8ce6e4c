//! Platform detection and OS-dependent filename tables.
//!
//! Everything the search heuristics and install strategies need to know
//! about the host: which OS family this is, which system package manager is
//! usable, where conventional install prefixes live, and how executables
//! and libraries are named.

use std::path::{Path, PathBuf};

/// Host operating-system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Detect the current platform.
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }
}

/// A usable system package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemPackageManager {
    Homebrew,
    MacPorts,
    Apt,
    Yum,
}

impl SystemPackageManager {
    /// Detect the system package manager, honoring the fixed per-family
    /// priority: Homebrew before MacPorts on macOS, apt before yum on
    /// Linux. Windows has none.
    pub fn detect(platform: Platform) -> Option<Self> {
        match platform {
            Platform::MacOs => {
                if on_path("brew") {
                    Some(SystemPackageManager::Homebrew)
                } else if on_path("port") {
                    Some(SystemPackageManager::MacPorts)
                } else {
                    None
                }
            }
            Platform::Linux => {
                if on_path("apt-get") && Path::new("/etc/apt/sources.list").exists() {
                    Some(SystemPackageManager::Apt)
                } else if on_path("yum") && Path::new("/etc/yum.conf").exists() {
                    Some(SystemPackageManager::Yum)
                } else {
                    None
                }
            }
            Platform::Windows => None,
        }
    }

    /// The install command line prefix for this manager.
    pub fn install_argv(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            SystemPackageManager::Homebrew => ("brew", &["install"]),
            SystemPackageManager::MacPorts => ("port", &["install"]),
            SystemPackageManager::Apt => ("apt-get", &["install", "-y"]),
            SystemPackageManager::Yum => ("yum", &["install", "-y"]),
        }
    }

    /// Whether invoking this manager requires elevated privileges.
    /// Homebrew refuses to run under sudo.
    pub fn needs_elevation(&self) -> bool {
        !matches!(self, SystemPackageManager::Homebrew)
    }
}

/// Whether an executable with this name is somewhere on PATH.
fn on_path(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| {
        exe_candidates(name, Platform::current())
            .iter()
            .any(|cand| dir.join(cand).is_file())
    })
}

/// Parse the system PATH variable into a directory list.
pub fn system_path() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|path| std::env::split_paths(&path).collect())
        .unwrap_or_default()
}

/// OS-conventional install prefixes, lowest priority in any search.
pub fn default_prefixes(platform: Platform) -> Vec<PathBuf> {
    match platform {
        Platform::Windows => programfiles_directories(),
        _ => vec![
            PathBuf::from("/usr"),
            PathBuf::from("/usr/local"),
            PathBuf::from("/opt/local"),
        ],
    }
}

/// Program Files variants on Windows, empty elsewhere.
pub fn programfiles_directories() -> Vec<PathBuf> {
    if cfg!(target_os = "windows") {
        let drive = std::env::var("ProgramFiles")
            .ok()
            .and_then(|p| p.get(..2).map(String::from))
            .unwrap_or_else(|| "C:".to_string());
        vec![
            PathBuf::from(format!("{drive}\\Program Files")),
            PathBuf::from(format!("{drive}\\Program Files (x86)")),
        ]
    } else {
        Vec::new()
    }
}

/// Candidate filenames for an executable on this platform.
pub fn exe_candidates(name: &str, platform: Platform) -> Vec<String> {
    match platform {
        Platform::Windows => vec![
            name.to_string(),
            format!("{name}.exe"),
            format!("{name}.bat"),
            format!("{name}.cmd"),
        ],
        _ => vec![name.to_string()],
    }
}

/// Library filename conventions for one platform.
#[derive(Debug, Clone)]
pub struct LibraryNaming {
    /// Filename prefixes, tried in order.
    pub prefixes: &'static [&'static str],
    /// Filename suffixes, tried in order.
    pub suffixes: &'static [&'static str],
    /// Subdirectories probed under each candidate prefix.
    pub subdirs: &'static [&'static str],
}

impl LibraryNaming {
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Linux => LibraryNaming {
                prefixes: &["lib", ""],
                suffixes: &[".so", ".a"],
                subdirs: &["lib64", "lib"],
            },
            Platform::MacOs => LibraryNaming {
                prefixes: &["lib", ""],
                suffixes: &[".dylib", ".so", ".a"],
                subdirs: &["lib64", "lib"],
            },
            // DLLs commonly live next to executables on Windows.
            Platform::Windows => LibraryNaming {
                prefixes: &["", "lib"],
                suffixes: &[".dll", ".dll.a", ".lib", ".a"],
                subdirs: &["lib64", "lib", "bin"],
            },
        }
    }

    /// Glob patterns matching this library's filenames, in probe order.
    pub fn patterns(&self, name: &str, wildcard: bool) -> Vec<String> {
        let infix = if wildcard { "*" } else { "" };
        let mut patterns = Vec::new();
        for prefix in self.prefixes {
            for suffix in self.suffixes {
                patterns.push(format!("{prefix}{name}{infix}{suffix}"));
            }
        }
        patterns
    }
}
