//! Filesystem search heuristics for programs, headers, and libraries.
//!
//! All three searches share one shape: build a prioritized candidate
//! directory list, probe conventional sub-locations in a fixed order, and
//! match filenames with shell-style wildcards against an OS-dependent
//! naming table. The first match wins, and traversal order is fully
//! deterministic (candidate order, then sub-location order, then sorted
//! directory walks), so explicit caller paths always beat defaults.
//!
//! When `limited` is true only the caller-supplied paths are consulted:
//! a user who pins a location must never have it silently bypassed.

use crate::config::EngineConfig;
use crate::error::{CairnError, Result};
use crate::platform::{self, LibraryNaming, Platform};
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Check whether a file has executable permission bits set.
#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// On Windows, executability is determined by file extension, not
/// permission bits.
#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Expand one caller-supplied path, which may itself be a glob expression.
fn expand_path(path: &Path) -> Vec<PathBuf> {
    let raw = path.to_string_lossy();
    if raw.contains(['*', '?', '[']) {
        match glob::glob(&raw) {
            Ok(paths) => {
                let mut expanded: Vec<PathBuf> = paths.filter_map(|p| p.ok()).collect();
                expanded.sort();
                expanded
            }
            Err(_) => Vec::new(),
        }
    } else {
        vec![path.to_path_buf()]
    }
}

/// Build the candidate directory list for a search.
///
/// Caller paths come first. Unless `limited`, previously-successful local
/// prefixes and the given fallback directories are appended, in that order.
fn candidate_dirs(
    extra_paths: &[PathBuf],
    limited: bool,
    config: &EngineConfig,
    fallback: &[PathBuf],
) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();
    let mut push = |path: PathBuf| {
        if !candidates.contains(&path) {
            candidates.push(path);
        }
    };

    for path in extra_paths {
        for expanded in expand_path(path) {
            push(expanded);
        }
    }
    if !limited {
        for path in &config.search_paths {
            push(path.clone());
        }
        for path in fallback {
            push(path.clone());
        }
    }
    candidates
}

/// Find the path of an executable.
///
/// Probes each candidate directory and its `bin` subdirectory for the
/// platform's executable filename variants. Unless `limited`, the system
/// PATH and cached local prefixes are searched after the caller's paths.
pub fn find_program(
    name: &str,
    extra_paths: &[PathBuf],
    limited: bool,
    config: &EngineConfig,
) -> Result<PathBuf> {
    let platform = Platform::current();
    let fallback = platform::system_path();
    let candidates = candidate_dirs(extra_paths, limited, config, &fallback);
    let filenames = platform::exe_candidates(name, platform);

    for dir in &candidates {
        for probe in [dir.clone(), dir.join("bin")] {
            for filename in &filenames {
                let full = probe.join(filename);
                tracing::trace!(path = %full.display(), "probing for {name}");
                if full.is_file() && is_executable(&full) {
                    tracing::debug!(path = %full.display(), "found program {name}");
                    return Ok(full);
                }
            }
        }
    }
    Err(CairnError::NotFound {
        name: name.to_string(),
    })
}

/// Find the directory containing a header file.
///
/// `file` may carry a directory component (`boost/version.hpp`); a match
/// then requires the file's parent directory name to glob-match that
/// component, and the directory *containing* the matched parent is
/// returned. Hints may be glob patterns (`boost-*`) to support versioned
/// install layouts.
pub fn find_header(
    file: &str,
    extra_paths: &[PathBuf],
    subdir_hints: &[String],
    limited: bool,
    config: &EngineConfig,
) -> Result<PathBuf> {
    let platform = Platform::current();
    let fallback = platform::default_prefixes(platform);
    let candidates = candidate_dirs(extra_paths, limited, config, &fallback);

    let wanted = Path::new(file);
    let basename = wanted
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let dirname = wanted
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().to_string());

    let file_pattern = compile_pattern(&basename);
    let dir_pattern = dirname.as_deref().map(compile_pattern);

    // Probe include/, then hinted subdirectories, then the bare candidate.
    let mut subdirs = vec!["include".to_string()];
    for hint in subdir_hints {
        subdirs.push(format!("include/{hint}"));
        subdirs.push(hint.clone());
    }
    subdirs.push(String::new());

    for dir in &candidates {
        for sub in &subdirs {
            let probe = if sub.is_empty() {
                dir.clone()
            } else {
                dir.join(sub)
            };
            for root in expand_path(&probe) {
                if !root.is_dir() {
                    continue;
                }
                if let Some(found) =
                    walk_for_header(&root, &file_pattern, dir_pattern.as_ref())
                {
                    tracing::debug!(dir = %found.display(), "found header {file}");
                    return Ok(found);
                }
            }
        }
    }
    Err(CairnError::NotFound {
        name: file.to_string(),
    })
}

fn walk_for_header(
    root: &Path,
    file_pattern: &Pattern,
    dir_pattern: Option<&Pattern>,
) -> Option<PathBuf> {
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if !file_pattern.matches(&name) {
            continue;
        }
        let parent = entry.path().parent()?;
        match dir_pattern {
            None => return Some(parent.to_path_buf()),
            Some(pattern) => {
                let parent_name = parent.file_name()?.to_string_lossy();
                if pattern.matches(&parent_name) {
                    return Some(parent.parent()?.to_path_buf());
                }
            }
        }
    }
    None
}

/// Find the directory and filename of a single library.
pub fn find_library(
    name: &str,
    extra_paths: &[PathBuf],
    subdir_hints: &[String],
    limited: bool,
    wildcard: bool,
    config: &EngineConfig,
) -> Result<(PathBuf, String)> {
    let (dir, mut files) =
        find_libraries(name, extra_paths, subdir_hints, limited, wildcard, config)?;
    Ok((dir, files.remove(0)))
}

/// Find the directory containing a library and every matching filename in
/// that directory.
///
/// The first directory with any match wins; all matches within it are
/// returned so multi-component libraries resolve in one pass.
pub fn find_libraries(
    name: &str,
    extra_paths: &[PathBuf],
    subdir_hints: &[String],
    limited: bool,
    wildcard: bool,
    config: &EngineConfig,
) -> Result<(PathBuf, Vec<String>)> {
    let platform = Platform::current();
    let naming = LibraryNaming::for_platform(platform);
    let fallback = platform::default_prefixes(platform);
    let candidates = candidate_dirs(extra_paths, limited, config, &fallback);

    let patterns: Vec<Pattern> = naming
        .patterns(name, wildcard)
        .iter()
        .map(|p| compile_pattern(p))
        .collect();

    let mut subdirs: Vec<String> = naming.subdirs.iter().map(|s| s.to_string()).collect();
    subdirs.extend(subdir_hints.iter().cloned());
    subdirs.push(String::new());

    for dir in &candidates {
        for sub in &subdirs {
            let probe = if sub.is_empty() {
                dir.clone()
            } else {
                dir.join(sub)
            };
            for root in expand_path(&probe) {
                if !root.is_dir() {
                    continue;
                }
                for entry in WalkDir::new(&root)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if !entry.file_type().is_dir() {
                        continue;
                    }
                    let matches = matching_files(entry.path(), &patterns);
                    if !matches.is_empty() {
                        tracing::debug!(dir = %entry.path().display(), "found library {name}");
                        return Ok((entry.path().to_path_buf(), matches));
                    }
                }
            }
        }
    }
    Err(CairnError::NotFound {
        name: name.to_string(),
    })
}

/// Filenames in one directory matching any pattern, in pattern order then
/// name order.
fn matching_files(dir: &Path, patterns: &[Pattern]) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    names.sort();

    let mut matches = Vec::new();
    for pattern in patterns {
        for name in &names {
            if pattern.matches(name) && !matches.contains(name) {
                matches.push(name.clone());
            }
        }
    }
    matches
}

/// Compile a glob pattern; input with broken glob syntax is matched
/// literally instead.
fn compile_pattern(raw: &str) -> Pattern {
    Pattern::new(raw).unwrap_or_else(|_| {
        Pattern::new(&glob::Pattern::escape(raw)).expect("escaped pattern is valid")
    })
}
