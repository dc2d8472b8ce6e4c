//! Persistent configuration cache.
//!
//! One JSON record per build directory holding the discovered environment
//! and the local search paths that produced it. The cache is a hint, never
//! a source of truth: callers always remain free to re-probe, and a record
//! that fails to parse is discarded with a warning rather than failing the
//! run. Its real job is persisting search paths so a locally-built
//! prerequisite from a previous run is found without re-downloading.

use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// The persisted record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
    local_search_paths: Vec<PathBuf>,
    environment: Environment,
    saved_at: DateTime<Utc>,
}

/// Load the cached environment and search paths for a build directory.
///
/// A missing file yields empty defaults. A malformed file is logged and
/// treated as missing.
pub fn load(config: &EngineConfig) -> (Environment, Vec<PathBuf>) {
    let path = config.cache_path();
    let Ok(contents) = fs::read_to_string(&path) else {
        return (Environment::new(), Vec::new());
    };
    match serde_json::from_str::<CacheRecord>(&contents) {
        Ok(record) => {
            tracing::debug!(
                path = %path.display(),
                saved_at = %record.saved_at,
                "loaded configuration cache"
            );
            (record.environment, record.local_search_paths)
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "discarding unreadable cache");
            (Environment::new(), Vec::new())
        }
    }
}

/// Persist the environment and search paths.
///
/// Uses the write-to-temp-then-rename pattern so the record is never left
/// partially written.
pub fn save(config: &EngineConfig, environment: &Environment, paths: &[PathBuf]) -> Result<()> {
    fs::create_dir_all(&config.build_dir)?;
    let record = CacheRecord {
        local_search_paths: paths.to_vec(),
        environment: environment.clone(),
        saved_at: Utc::now(),
    };
    let contents = serde_json::to_string_pretty(&record)
        .map_err(|e| anyhow::anyhow!("failed to serialize cache: {e}"))?;

    let path = config.cache_path();
    let temp = path.with_extension("json.tmp");
    fs::write(&temp, contents)?;
    fs::rename(&temp, &path)?;
    Ok(())
}

/// Remove the cache record (full clean).
pub fn delete(config: &EngineConfig) -> Result<()> {
    let path = config.cache_path();
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> EngineConfig {
        EngineConfig::new(temp.path().join("build"))
    }

    #[test]
    fn load_missing_yields_empty_defaults() {
        let temp = TempDir::new().unwrap();
        let (env, paths) = load(&config_in(&temp));
        assert!(env.is_empty());
        assert!(paths.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let mut env = Environment::new();
        env.set("ZLIB_INCLUDE_DIR", "/usr/include");
        env.set(
            "ZLIB_LIBRARIES",
            vec!["z".to_string()],
        );
        let paths = vec![PathBuf::from("/opt/build")];

        save(&config, &env, &paths).unwrap();
        let (loaded_env, loaded_paths) = load(&config);
        assert_eq!(loaded_env, env);
        assert_eq!(loaded_paths, paths);
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        save(&config, &Environment::new(), &[]).unwrap();
        assert!(config.cache_path().exists());
        assert!(!config.cache_path().with_extension("json.tmp").exists());
    }

    #[test]
    fn malformed_cache_is_discarded() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        fs::create_dir_all(&config.build_dir).unwrap();
        fs::write(config.cache_path(), "not json {").unwrap();

        let (env, paths) = load(&config);
        assert!(env.is_empty());
        assert!(paths.is_empty());
    }

    #[test]
    fn delete_removes_record_and_tolerates_absence() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        save(&config, &Environment::new(), &[]).unwrap();

        delete(&config).unwrap();
        assert!(!config.cache_path().exists());
        delete(&config).unwrap();
    }

    #[test]
    fn save_overwrites_previous_record() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);

        let mut first = Environment::new();
        first.set("A", "1");
        save(&config, &first, &[]).unwrap();

        let mut second = Environment::new();
        second.set("B", "2");
        save(&config, &second, &[]).unwrap();

        let (loaded, _) = load(&config);
        assert_eq!(loaded, second);
    }
}
