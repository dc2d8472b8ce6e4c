//! Synthesized providers for the language package index.
//!
//! When a dependency name resolves to nothing else but is confirmed to
//! exist in the configured package index, a generic provider is constructed
//! on the fly: it fetches the source distribution by naming convention,
//! runs the host language's standard setup-script install, and discovers
//! the package's own declared requirements by best-effort static inspection
//! of its setup script. That inspection is heuristic and may under-report;
//! any failure yields an empty list with a debug note, never an error.

use crate::config::EngineConfig;
use crate::depspec::{env_prefix, DependencySpec};
use crate::environment::{EnvValue, Environment};
use crate::error::{CairnError, Result};
use crate::exec::{self, ExecOptions};
use crate::fetch::Fetcher;
use crate::install::{self, InstallOutcome};
use crate::{archive, version};
use std::path::{Path, PathBuf};

/// Whether the index's per-package listing answers for this name.
pub fn exists_in_index(name: &str, fetcher: &Fetcher, config: &EngineConfig) -> bool {
    let url = package_page(&config.index_url, name);
    let found = fetcher.exists(&url);
    tracing::debug!(%name, %url, found, "package index lookup");
    found
}

/// `<base>/<initial>/<name>/`
fn package_page(base: &str, name: &str) -> String {
    let initial = name.chars().next().unwrap_or('_');
    format!("{}/{}/{}/", base.trim_end_matches('/'), initial, name)
}

/// A provider synthesized from the package index naming convention.
pub struct PackageIndexProvider {
    name: String,
    module: String,
}

impl PackageIndexProvider {
    pub fn new(name: &str) -> Self {
        let name = name.to_lowercase();
        // Distribution names use dashes where module names use underscores.
        let module = name.replace('-', "_");
        Self { name, module }
    }

    fn prefix(&self) -> String {
        env_prefix(&self.name)
    }

    fn source_dir(&self, config: &EngineConfig) -> PathBuf {
        config.build_dir.join(&self.name)
    }

    /// Python interpreter environment for checks and installs.
    fn interpreter_options(&self, config: &EngineConfig) -> ExecOptions {
        let mut options = ExecOptions::default();
        if config.install_locally {
            let lib = config
                .local_lib_dir
                .canonicalize()
                .unwrap_or_else(|_| config.local_lib_dir.clone());
            options = options.with_env("PYTHONPATH", &lib.to_string_lossy());
        }
        options
    }
}

impl super::Provider for PackageIndexProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self, config: &EngineConfig) -> Vec<DependencySpec> {
        let setup = self.source_dir(config).join("setup.py");
        if setup.is_file() {
            discover_requirements(&setup)
        } else {
            tracing::debug!(
                dependency = %self.name,
                "source not fetched yet, requirement discovery deferred"
            );
            Vec::new()
        }
    }

    fn declare_defaults(&self, env: &mut Environment) {
        env.set_default(&format!("{}_VERSION", self.prefix()), EnvValue::Absent);
    }

    fn check_installed(
        &self,
        env: &mut Environment,
        config: &EngineConfig,
        version_req: Option<&str>,
        strict: bool,
    ) -> Result<bool> {
        let script = format!(
            "import {m}; print(getattr({m}, '__version__', ''))",
            m = self.module
        );
        let options = self.interpreter_options(config);
        let output = match exec::capture_stdout(
            "python3",
            &["-c".to_string(), script],
            &options,
        ) {
            Ok(output) => output,
            Err(_) => return Ok(false),
        };

        let found = Some(output.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(requested) = version_req {
            match &found {
                Some(found) if !version::satisfies(Some(found), Some(requested), strict) => {
                    tracing::debug!(
                        dependency = %self.name, found, requested, "wrong version"
                    );
                    return Ok(false);
                }
                Some(_) => {}
                None => tracing::debug!(
                    dependency = %self.name,
                    "module version undeterminable, accepting"
                ),
            }
        }

        if let Some(found) = found {
            env.set(&format!("{}_VERSION", self.prefix()), found);
        }
        Ok(true)
    }

    fn download(
        &self,
        _env: &mut Environment,
        fetcher: &Fetcher,
        config: &EngineConfig,
        version_req: Option<&str>,
    ) -> Result<PathBuf> {
        let version = version_req.ok_or_else(|| CairnError::Config {
            message: format!(
                "a version is required to fetch '{}' from the package index",
                self.name
            ),
        })?;
        let page = package_page(&config.index_url, &self.name);
        let tarball = format!("{}-{}.tar.gz", self.name, version);

        let archive_path =
            match crate::ui::progress::fetch_with_progress(fetcher, &page, &tarball, &tarball, config) {
                Ok(path) => path,
                Err(CairnError::Download { .. }) => {
                    // Older distributions ship zips only.
                    let zipball = format!("{}-{}.zip", self.name, version);
                    crate::ui::progress::fetch_with_progress(fetcher, &page, &zipball, &zipball, config)?
                }
                Err(other) => return Err(other),
            };
        archive::unpack(&archive_path, &self.name, config)
    }

    fn install(
        &self,
        env: &mut Environment,
        fetcher: &Fetcher,
        config: &EngineConfig,
        version_req: Option<&str>,
        _strict: bool,
    ) -> Result<InstallOutcome> {
        let source_dir = self.source_dir(config);
        let source_dir = if source_dir.join("setup.py").is_file() {
            source_dir
        } else {
            self.download(env, fetcher, config, version_req)?
        };

        let discovered = discover_requirements(&source_dir.join("setup.py"));
        if !discovered.is_empty() {
            tracing::debug!(
                dependency = %self.name,
                requirements = ?discovered.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
                "declared requirements of fetched package"
            );
        }

        install::package_index_install(&self.name, &source_dir, config)
    }
}

/// Best-effort static inspection of a setup script's requirement list.
///
/// Scans for a `requires`/`install_requires` list literal and parses each
/// quoted entry as a requirement expression. Returns an empty list on any
/// failure.
pub fn discover_requirements(setup_py: &Path) -> Vec<DependencySpec> {
    let Ok(contents) = std::fs::read_to_string(setup_py) else {
        tracing::debug!(path = %setup_py.display(), "setup script unreadable");
        return Vec::new();
    };
    let Ok(list_pattern) =
        regex::Regex::new(r"(?s)(?:install_requires|requires)\s*=\s*\[(.*?)\]")
    else {
        return Vec::new();
    };
    let Some(list) = list_pattern.captures(&contents).map(|c| c[1].to_string()) else {
        tracing::debug!(path = %setup_py.display(), "no requirement list found");
        return Vec::new();
    };
    let Ok(item_pattern) = regex::Regex::new(r#"['"]([^'"]+)['"]"#) else {
        return Vec::new();
    };

    let mut specs = Vec::new();
    for capture in item_pattern.captures_iter(&list) {
        match DependencySpec::parse(&capture[1]) {
            Ok(spec) => specs.push(spec),
            Err(err) => {
                tracing::debug!(entry = &capture[1], %err, "skipping unparseable requirement");
            }
        }
    }
    specs
}
