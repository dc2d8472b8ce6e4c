//! Declarative providers for libraries and programs.
//!
//! Most dependencies fit one of two shapes: "a header plus a library" or
//! "an executable on the path". [`ProviderSpec`] captures everything such a
//! dependency needs — detection inputs, a source-build recipe, package
//! manager name mappings — and [`DeclaredProvider`] interprets it. The
//! built-in provider set and user override files both produce these specs.

use crate::config::EngineConfig;
use crate::depspec::{env_prefix, DependencySpec};
use crate::environment::{EnvValue, Environment};
use crate::error::{CairnError, Result};
use crate::fetch::Fetcher;
use crate::install::{self, InstallOutcome};
use crate::platform::programfiles_directories;
use crate::{archive, locate, version};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// What shape of dependency a spec describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Library,
    Program,
}

/// Recipe for building the dependency from a source archive.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecipe {
    /// Base URL the archive is fetched from.
    pub url: String,
    /// Archive filename template; `{version}` is substituted.
    pub archive: String,
    /// Canonical extracted directory name (defaults to the dependency name).
    #[serde(default)]
    pub dir: Option<String>,
    /// Version used when the requirement does not pin one.
    #[serde(default)]
    pub default_version: Option<String>,
    /// Extra arguments appended to the configure step.
    #[serde(default)]
    pub configure_args: Vec<String>,
}

impl SourceRecipe {
    /// Resolve the archive filename for a version.
    pub fn archive_name(&self, version: Option<&str>) -> Result<String> {
        if !self.archive.contains("{version}") {
            return Ok(self.archive.clone());
        }
        let version = version
            .or(self.default_version.as_deref())
            .ok_or_else(|| CairnError::Config {
                message: format!("archive template '{}' needs a version", self.archive),
            })?;
        Ok(self.archive.replace("{version}", version))
    }
}

/// Package-manager-specific package names for one dependency.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageNames {
    #[serde(default)]
    pub brew: Option<String>,
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub apt: Option<String>,
    #[serde(default)]
    pub yum: Option<String>,
    /// Windows vendor installer filename template (`{version}` substituted),
    /// fetched from `installer_url`.
    #[serde(default)]
    pub installer: Option<String>,
    #[serde(default)]
    pub installer_url: Option<String>,
}

impl PackageNames {
    pub fn is_empty(&self) -> bool {
        self.brew.is_none() && self.port.is_none() && self.apt.is_none() && self.yum.is_none()
    }
}

/// Declarative description of one dependency.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSpec {
    #[serde(default)]
    pub name: String,
    pub kind: ProviderKind,
    /// Header file to locate (libraries); may carry a directory component.
    #[serde(default)]
    pub header: Option<String>,
    /// Library base name (defaults to the dependency name).
    #[serde(default)]
    pub library: Option<String>,
    /// Executable name (programs; defaults to the dependency name).
    #[serde(default)]
    pub program: Option<String>,
    /// Subdirectory hints, possibly glob patterns (`boost-*`).
    #[serde(default)]
    pub subdir_hints: Vec<String>,
    /// Exported link names; derived from found files when empty.
    #[serde(default)]
    pub libraries: Vec<String>,
    /// `#define` constant holding the version inside the located header.
    #[serde(default)]
    pub version_constant: Option<String>,
    /// Arguments that make the program print its version (default
    /// `--version`).
    #[serde(default)]
    pub version_args: Vec<String>,
    #[serde(default)]
    pub source: Option<SourceRecipe>,
    #[serde(default)]
    pub packages: PackageNames,
    /// Requirement expressions this dependency needs first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ProviderSpec {
    /// A library dependency detected by header + library name.
    pub fn library(name: &str, header: &str, library: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            kind: ProviderKind::Library,
            header: Some(header.to_string()),
            library: Some(library.to_string()),
            program: None,
            subdir_hints: Vec::new(),
            libraries: Vec::new(),
            version_constant: None,
            version_args: Vec::new(),
            source: None,
            packages: PackageNames::default(),
            dependencies: Vec::new(),
        }
    }

    /// A program dependency detected by executable lookup.
    pub fn program(name: &str, exe: &str) -> Self {
        Self {
            name: name.to_lowercase(),
            kind: ProviderKind::Program,
            header: None,
            library: None,
            program: Some(exe.to_string()),
            subdir_hints: Vec::new(),
            libraries: Vec::new(),
            version_constant: None,
            version_args: Vec::new(),
            source: None,
            packages: PackageNames::default(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_source(mut self, source: SourceRecipe) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_packages(mut self, packages: PackageNames) -> Self {
        self.packages = packages;
        self
    }

    pub fn with_hints(mut self, hints: &[&str]) -> Self {
        self.subdir_hints = hints.iter().map(|h| h.to_string()).collect();
        self
    }

    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    fn library_name(&self) -> String {
        self.library.clone().unwrap_or_else(|| self.name.clone())
    }

    fn program_name(&self) -> String {
        self.program.clone().unwrap_or_else(|| self.name.clone())
    }

    /// Canonical source directory name under the build dir.
    pub fn source_dir_name(&self) -> String {
        self.source
            .as_ref()
            .and_then(|s| s.dir.clone())
            .unwrap_or_else(|| self.name.clone())
    }
}

/// A provider driven entirely by a [`ProviderSpec`].
pub struct DeclaredProvider {
    spec: ProviderSpec,
}

impl DeclaredProvider {
    pub fn new(spec: ProviderSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    fn prefix(&self) -> String {
        env_prefix(&self.spec.name)
    }

    fn check_library(
        &self,
        env: &mut Environment,
        config: &EngineConfig,
        requested: Option<&str>,
        strict: bool,
    ) -> Result<bool> {
        let prefix = self.prefix();
        let lib_dir_key = format!("{prefix}_LIB_DIR");
        let include_key = format!("{prefix}_INCLUDE_DIR");

        // An explicit location disables all fallback search.
        let mut locations: Vec<PathBuf> = Vec::new();
        let mut limited = false;
        if let Some(dir) = env.get_str(&lib_dir_key) {
            locations.push(PathBuf::from(dir));
            limited = true;
            if let Some(dir) = env.get_str(&include_key) {
                locations.push(PathBuf::from(dir));
            }
        }
        if !limited {
            locations.extend(ambient_locations(&prefix));
        }

        let include_dir = match &self.spec.header {
            Some(header) => {
                match locate::find_header(header, &locations, &self.spec.subdir_hints, limited, config)
                {
                    Ok(dir) => Some(dir),
                    Err(err) if err.is_not_found() => return Ok(false),
                    Err(err) => return Err(err),
                }
            }
            None => None,
        };

        let (lib_dir, files) = match locate::find_libraries(
            &self.spec.library_name(),
            &locations,
            &self.spec.subdir_hints,
            limited,
            true,
            config,
        ) {
            Ok(found) => found,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };

        let found_version = match (&include_dir, &self.spec.version_constant, &self.spec.header) {
            (Some(dir), Some(constant), Some(header)) => {
                header_constant(&dir.join(header), constant)
            }
            _ => None,
        };
        if !version_gate(&self.spec.name, found_version.as_deref(), requested, strict) {
            return Ok(false);
        }

        if let Some(dir) = include_dir {
            env.set(&include_key, dir.to_string_lossy().to_string());
        }
        env.set(&lib_dir_key, lib_dir.to_string_lossy().to_string());
        env.set(&format!("{prefix}_LIB_FILES"), files.clone());
        let link_names = if self.spec.libraries.is_empty() {
            let mut names: Vec<String> = files.iter().map(|f| link_name(f)).collect();
            names.dedup();
            names
        } else {
            self.spec.libraries.clone()
        };
        env.set(&format!("{prefix}_LIBRARIES"), link_names);
        if let Some(found) = found_version {
            env.set(&format!("{prefix}_VERSION"), found);
        }
        Ok(true)
    }

    fn check_program(
        &self,
        env: &mut Environment,
        config: &EngineConfig,
        requested: Option<&str>,
        strict: bool,
    ) -> Result<bool> {
        let prefix = self.prefix();

        let mut locations: Vec<PathBuf> = Vec::new();
        let mut limited = false;
        if let Some(path) = env.get_str(&prefix) {
            if let Some(parent) = Path::new(path).parent() {
                locations.push(parent.to_path_buf());
                limited = true;
            }
        }
        if !limited {
            if let Ok(root) = std::env::var(format!("{prefix}_ROOT")) {
                locations.push(PathBuf::from(root.trim_matches('"')));
            }
        }

        let path = match locate::find_program(&self.spec.program_name(), &locations, limited, config)
        {
            Ok(path) => path,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };

        let found_version = if requested.is_some() {
            probe_program_version(&path, &self.spec.version_args)
        } else {
            None
        };
        if !version_gate(&self.spec.name, found_version.as_deref(), requested, strict) {
            return Ok(false);
        }

        env.set(&prefix, path.to_string_lossy().to_string());
        if let Some(found) = found_version {
            env.set(&format!("{prefix}_VERSION"), found);
        }
        Ok(true)
    }
}

impl super::Provider for DeclaredProvider {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn dependencies(&self, _config: &EngineConfig) -> Vec<DependencySpec> {
        self.spec
            .dependencies
            .iter()
            .filter_map(|expr| match DependencySpec::parse(expr) {
                Ok(spec) => Some(spec),
                Err(err) => {
                    tracing::warn!(%expr, %err, "skipping unparseable dependency");
                    None
                }
            })
            .collect()
    }

    fn declare_defaults(&self, env: &mut Environment) {
        let prefix = self.prefix();
        match self.spec.kind {
            ProviderKind::Library => {
                env.set_default(&format!("{prefix}_INCLUDE_DIR"), EnvValue::Absent);
                env.set_default(&format!("{prefix}_LIB_DIR"), EnvValue::Absent);
                env.set_default(&format!("{prefix}_LIB_FILES"), Vec::<String>::new());
                env.set_default(&format!("{prefix}_LIBRARIES"), Vec::<String>::new());
            }
            ProviderKind::Program => {
                env.set_default(&prefix, EnvValue::Absent);
            }
        }
        env.set_default(&format!("{prefix}_VERSION"), EnvValue::Absent);
    }

    fn check_installed(
        &self,
        env: &mut Environment,
        config: &EngineConfig,
        version: Option<&str>,
        strict: bool,
    ) -> Result<bool> {
        match self.spec.kind {
            ProviderKind::Library => self.check_library(env, config, version, strict),
            ProviderKind::Program => self.check_program(env, config, version, strict),
        }
    }

    fn download(
        &self,
        _env: &mut Environment,
        fetcher: &Fetcher,
        config: &EngineConfig,
        version: Option<&str>,
    ) -> Result<PathBuf> {
        let Some(recipe) = &self.spec.source else {
            // Nothing to fetch for purely package-manager-driven installs.
            return Ok(config.build_dir.clone());
        };
        let archive_name = recipe.archive_name(version)?;
        let archive_path =
            crate::ui::progress::fetch_with_progress(fetcher, &recipe.url, &archive_name, &archive_name, config)?;
        archive::unpack(&archive_path, &self.spec.source_dir_name(), config)
    }

    fn install(
        &self,
        _env: &mut Environment,
        fetcher: &Fetcher,
        config: &EngineConfig,
        version: Option<&str>,
        _strict: bool,
    ) -> Result<InstallOutcome> {
        install::install_declared(&self.spec, fetcher, config, version)
    }
}

/// Ambient location hints consulted when the search is not limited.
fn ambient_locations(prefix: &str) -> Vec<PathBuf> {
    let mut locations = Vec::new();
    for var in ["LD_LIBRARY_PATH", "CPATH"] {
        if let Some(value) = std::env::var_os(var) {
            locations.extend(std::env::split_paths(&value));
        }
    }
    if let Ok(root) = std::env::var(format!("{prefix}_ROOT")) {
        locations.push(PathBuf::from(root.trim_matches('"')));
    }
    for dir in programfiles_directories() {
        locations.push(dir.join("GnuWin32"));
    }
    locations
}

/// Link name for a library file: `libpng16.so.16` -> `png16`.
fn link_name(file: &str) -> String {
    let stem = file.split('.').next().unwrap_or(file);
    stem.strip_prefix("lib").unwrap_or(stem).to_string()
}

/// Extract a version from a `#define CONSTANT "..."` line in a header.
fn header_constant(header: &Path, constant: &str) -> Option<String> {
    let contents = std::fs::read_to_string(header).ok()?;
    let pattern = regex::Regex::new(&format!(
        r#"#\s*define\s+{}\s+"?([0-9A-Za-z._-]+)"?"#,
        regex::escape(constant)
    ))
    .ok()?;
    pattern
        .captures(&contents)
        .map(|c| c[1].trim_matches('"').to_string())
}

/// Run a program's version command and extract a dotted version number.
fn probe_program_version(path: &Path, version_args: &[String]) -> Option<String> {
    let args: Vec<String> = if version_args.is_empty() {
        vec!["--version".to_string()]
    } else {
        version_args.to_vec()
    };
    let output = crate::exec::capture_stdout(
        &path.to_string_lossy(),
        &args,
        &crate::exec::ExecOptions::default(),
    )
    .ok()?;
    extract_version(&output)
}

/// First dotted version number in free-form tool output.
pub fn extract_version(output: &str) -> Option<String> {
    let pattern = regex::Regex::new(r"\d+(?:\.\d+)+(?:[._-][0-9A-Za-z]+)*").ok()?;
    pattern.find(output).map(|m| m.as_str().to_string())
}

/// Apply the version gate, accepting finds whose version cannot be
/// determined (detection beats an unprovable mismatch; the original's
/// per-dependency checks behave the same way).
fn version_gate(name: &str, found: Option<&str>, requested: Option<&str>, strict: bool) -> bool {
    if requested.is_none() {
        return true;
    }
    match found {
        None => {
            tracing::debug!(
                dependency = name,
                requested,
                "installed version undeterminable, accepting"
            );
            true
        }
        Some(found) => {
            let ok = version::satisfies(Some(found), requested, strict);
            if !ok {
                tracing::debug!(dependency = name, found, requested, "wrong version");
            }
            ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> EngineConfig {
        EngineConfig::new(temp.path().join("build"))
    }

    fn touch(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn declare_defaults_seeds_library_keys() {
        let provider = DeclaredProvider::new(ProviderSpec::library("widget", "widget.h", "widget"));
        let mut env = Environment::new();
        provider.declare_defaults(&mut env);
        assert!(env.get("WIDGET_INCLUDE_DIR").is_some());
        assert!(env.get("WIDGET_LIB_DIR").is_some());
        assert!(!env.is_set("WIDGET_INCLUDE_DIR"));
        assert_eq!(env.get_list("WIDGET_LIBRARIES"), Some(&[][..]));
    }

    #[test]
    fn declare_defaults_never_clobbers_overrides() {
        let provider = DeclaredProvider::new(ProviderSpec::library("widget", "widget.h", "widget"));
        let mut env = Environment::new();
        env.set("WIDGET_LIB_DIR", "/opt/widget/lib");
        provider.declare_defaults(&mut env);
        assert_eq!(env.get_str("WIDGET_LIB_DIR"), Some("/opt/widget/lib"));
    }

    #[cfg(unix)]
    #[test]
    fn check_library_discovers_and_exports() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("prefix");
        touch(&root.join("include/widget.h"), "");
        touch(&root.join("lib/libwidget.so"), "");

        let mut config = config_in(&temp);
        config.add_search_path(&root);

        let provider = DeclaredProvider::new(ProviderSpec::library("widget", "widget.h", "widget"));
        let mut env = Environment::new();
        let found = provider
            .check_installed(&mut env, &config, None, false)
            .unwrap();

        assert!(found);
        let include = root.join("include").to_string_lossy().to_string();
        assert_eq!(env.get_str("WIDGET_INCLUDE_DIR"), Some(include.as_str()));
        assert_eq!(
            env.get_list("WIDGET_LIB_FILES"),
            Some(&["libwidget.so".to_string()][..])
        );
        assert_eq!(
            env.get_list("WIDGET_LIBRARIES"),
            Some(&["widget".to_string()][..])
        );
    }

    #[cfg(unix)]
    #[test]
    fn explicit_lib_dir_limits_search() {
        let temp = TempDir::new().unwrap();
        let real = temp.path().join("real");
        touch(&real.join("include/widget.h"), "");
        touch(&real.join("lib/libwidget.so"), "");
        let empty = temp.path().join("empty");
        fs::create_dir_all(&empty).unwrap();

        // Real prefix is in the search paths, but the user pinned an empty
        // location; the pin must win and the check must fail.
        let mut config = config_in(&temp);
        config.add_search_path(&real);

        let provider = DeclaredProvider::new(ProviderSpec::library("widget", "widget.h", "widget"));
        let mut env = Environment::new();
        env.set("WIDGET_LIB_DIR", empty.to_string_lossy().to_string());

        let found = provider
            .check_installed(&mut env, &config, None, false)
            .unwrap();
        assert!(!found);
    }

    #[cfg(unix)]
    #[test]
    fn version_constant_gates_the_find() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("prefix");
        touch(
            &root.join("include/widget.h"),
            "#define WIDGET_VERSION \"1.2.0\"\n",
        );
        touch(&root.join("lib/libwidget.so"), "");

        let mut config = config_in(&temp);
        config.add_search_path(&root);

        let mut spec = ProviderSpec::library("widget", "widget.h", "widget");
        spec.version_constant = Some("WIDGET_VERSION".to_string());
        let provider = DeclaredProvider::new(spec);

        let mut env = Environment::new();
        let found = provider
            .check_installed(&mut env, &config, Some("2.0"), false)
            .unwrap();
        assert!(!found, "1.2.0 must not satisfy >=2.0");

        let found = provider
            .check_installed(&mut env, &config, Some("1.2"), false)
            .unwrap();
        assert!(found);
        assert_eq!(env.get_str("WIDGET_VERSION"), Some("1.2.0"));
    }

    #[test]
    fn check_program_missing_returns_false() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let provider = DeclaredProvider::new(ProviderSpec::program(
            "nonexistent-tool-xyz",
            "nonexistent-tool-xyz",
        ));
        let mut env = Environment::new();
        // Pin to an empty dir so the system PATH cannot interfere.
        env.set("NONEXISTENT_TOOL_XYZ", temp.path().join("missing/t").to_string_lossy().to_string());
        let found = provider
            .check_installed(&mut env, &config, None, false)
            .unwrap();
        assert!(!found);
    }

    #[test]
    fn download_without_recipe_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let config = config_in(&temp);
        let provider = DeclaredProvider::new(ProviderSpec::library("widget", "widget.h", "widget"));
        let mut env = Environment::new();
        let dir = provider
            .download(&mut env, &Fetcher::new(), &config, None)
            .unwrap();
        assert_eq!(dir, config.build_dir);
    }

    #[test]
    fn dependencies_parse_requirement_expressions() {
        let spec =
            ProviderSpec::library("widget", "widget.h", "widget").with_dependencies(&["zlib>=1.2"]);
        let provider = DeclaredProvider::new(spec);
        let deps = provider.dependencies(&EngineConfig::new("build"));
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].name, "zlib");
        assert_eq!(deps[0].requested_version.as_deref(), Some("1.2"));
    }

    #[test]
    fn archive_name_substitutes_version() {
        let recipe = SourceRecipe {
            url: "https://example.com/dl".into(),
            archive: "widget-{version}.tar.gz".into(),
            dir: None,
            default_version: Some("2.0".into()),
            configure_args: Vec::new(),
        };
        assert_eq!(recipe.archive_name(Some("2.1")).unwrap(), "widget-2.1.tar.gz");
        assert_eq!(recipe.archive_name(None).unwrap(), "widget-2.0.tar.gz");
    }

    #[test]
    fn link_name_strips_prefix_and_extensions() {
        assert_eq!(link_name("libpng16.so.16"), "png16");
        assert_eq!(link_name("libz.a"), "z");
        assert_eq!(link_name("widget.dll"), "widget");
    }

    #[test]
    fn extract_version_finds_dotted_number() {
        assert_eq!(
            extract_version("GNU Make 4.3\nbuilt for x86_64").as_deref(),
            Some("4.3")
        );
        assert_eq!(extract_version("cmake version 3.28.1").as_deref(), Some("3.28.1"));
        assert_eq!(extract_version("no numbers here"), None);
    }

    #[test]
    fn version_gate_accepts_undeterminable() {
        assert!(version_gate("w", None, Some("2.0"), false));
        assert!(version_gate("w", Some("2.1"), Some("2.0"), false));
        assert!(!version_gate("w", Some("1.9"), Some("2.0"), false));
        assert!(!version_gate("w", Some("2.1"), Some("2.0"), true));
    }
}
