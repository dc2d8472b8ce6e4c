//! Install strategy selection and execution.
//!
//! For a dependency that failed its check, one of four strategies runs:
//! build from a fetched source archive, delegate to the host's system
//! package manager, run a vendor installer (Windows only), or install from
//! the language package index. Every strategy is idempotent — fetch and
//! unpack skip work that already happened — and every failure surfaces as a
//! single [`CairnError::Install`] pointing at the captured log rather than
//! a raw exit code.

use crate::archive;
use crate::config::EngineConfig;
use crate::environment::Environment;
use crate::error::{CairnError, Result};
use crate::exec::{self, ExecOptions};
use crate::fetch::Fetcher;
use crate::platform::{Platform, SystemPackageManager};
use crate::provider::declared::{PackageNames, ProviderSpec};
use std::io::Write;
use std::path::{Path, PathBuf};

/// What a successful install changed.
///
/// Merged into the shared environment and search paths by the engine only
/// on success.
#[derive(Debug, Default)]
pub struct InstallOutcome {
    pub env_delta: Environment,
    pub added_search_paths: Vec<PathBuf>,
}

impl InstallOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// The four ways a dependency can be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStrategy {
    SourceBuild,
    SystemPackage(SystemPackageManager),
    VendorInstaller,
    PackageIndex,
}

/// Choose a strategy for a declared dependency.
///
/// Local installs (and Windows, which has no usable system manager) prefer
/// building from source; otherwise the system package manager is preferred
/// when the provider maps a package name for it. The vendor installer is
/// the Windows fallback of last resort.
pub fn select_strategy(
    spec: &ProviderSpec,
    platform: Platform,
    manager: Option<SystemPackageManager>,
    locally: bool,
) -> Option<InstallStrategy> {
    let has_source = spec.source.is_some();
    let has_installer = spec.packages.installer.is_some();
    let managed = manager.filter(|m| package_names(&spec.packages, *m).is_some());

    let prefer_local = locally || (platform == Platform::Windows && manager.is_none());
    let mut order: Vec<InstallStrategy> = Vec::new();
    if prefer_local {
        if has_source {
            order.push(InstallStrategy::SourceBuild);
        }
        if let Some(m) = managed {
            order.push(InstallStrategy::SystemPackage(m));
        }
    } else {
        if let Some(m) = managed {
            order.push(InstallStrategy::SystemPackage(m));
        }
        if has_source {
            order.push(InstallStrategy::SourceBuild);
        }
    }
    if platform == Platform::Windows && has_installer {
        order.push(InstallStrategy::VendorInstaller);
    }
    order.into_iter().next()
}

/// Install a declared dependency by its selected strategy.
pub fn install_declared(
    spec: &ProviderSpec,
    fetcher: &Fetcher,
    config: &EngineConfig,
    version: Option<&str>,
) -> Result<InstallOutcome> {
    let platform = Platform::current();
    let manager = SystemPackageManager::detect(platform);
    let Some(strategy) = select_strategy(spec, platform, manager, config.install_locally) else {
        return Err(fail(
            &spec.name,
            config,
            "no usable install strategy: no source recipe, no package mapping for this host",
        ));
    };
    tracing::info!(dependency = %spec.name, ?strategy, "installing");

    match strategy {
        InstallStrategy::SourceBuild => source_build(spec, fetcher, config, version),
        InstallStrategy::SystemPackage(manager) => system_package(spec, manager, config),
        InstallStrategy::VendorInstaller => vendor_installer(spec, fetcher, config, version),
        InstallStrategy::PackageIndex => unreachable!("declared specs never select the index"),
    }
}

/// Fetch, unpack, and run the canonical configure/make/make-install recipe.
fn source_build(
    spec: &ProviderSpec,
    fetcher: &Fetcher,
    config: &EngineConfig,
    version: Option<&str>,
) -> Result<InstallOutcome> {
    let Some(recipe) = &spec.source else {
        return Err(fail(&spec.name, config, "source build selected without a recipe"));
    };
    let archive_name = recipe.archive_name(version)?;
    let archive_path =
        crate::ui::progress::fetch_with_progress(fetcher, &recipe.url, &archive_name, &archive_name, config)?;
    let src_dir = archive::unpack(&archive_path, &spec.source_dir_name(), config)?;

    let prefix = if config.install_locally {
        config.local_prefix()
    } else {
        config.global_prefix.clone()
    };
    let log = config.log_path(&spec.name);
    let options = ExecOptions::in_dir(&src_dir).with_log(&log);

    let mut configure_args = vec![format!("--prefix={}", prefix.display())];
    configure_args.extend(recipe.configure_args.iter().cloned());
    run_step(&spec.name, &log, "./configure", &configure_args, &options, false)?;
    run_step(&spec.name, &log, "make", &[], &options, false)?;
    run_step(
        &spec.name,
        &log,
        "make",
        &["install".to_string()],
        &options,
        !config.install_locally,
    )?;

    let mut outcome = InstallOutcome::empty();
    if config.install_locally {
        outcome.added_search_paths.push(prefix);
    }
    Ok(outcome)
}

/// Install through the detected system package manager.
fn system_package(
    spec: &ProviderSpec,
    manager: SystemPackageManager,
    config: &EngineConfig,
) -> Result<InstallOutcome> {
    let Some(packages) = package_names(&spec.packages, manager) else {
        return Err(fail(
            &spec.name,
            config,
            &format!("no package mapping for {manager:?}"),
        ));
    };
    let log = config.log_path(&spec.name);
    let options = ExecOptions::default().with_log(&log);
    let (program, base_args) = manager.install_argv();
    let mut args: Vec<String> = base_args.iter().map(|a| a.to_string()).collect();
    args.extend(packages.split_whitespace().map(String::from));

    run_step(
        &spec.name,
        &log,
        program,
        &args,
        &options,
        manager.needs_elevation(),
    )?;
    Ok(InstallOutcome::empty())
}

/// Fetch and silently run a platform-native installer (Windows only).
fn vendor_installer(
    spec: &ProviderSpec,
    fetcher: &Fetcher,
    config: &EngineConfig,
    version: Option<&str>,
) -> Result<InstallOutcome> {
    if Platform::current() != Platform::Windows {
        return Err(fail(&spec.name, config, "vendor installers only run on Windows"));
    }
    let (Some(template), Some(url)) = (
        spec.packages.installer.as_ref(),
        spec.packages.installer_url.as_ref(),
    ) else {
        return Err(fail(&spec.name, config, "no vendor installer declared"));
    };
    let installer = match version {
        Some(version) => template.replace("{version}", version),
        None => template.clone(),
    };
    let path = crate::ui::progress::fetch_with_progress(fetcher, url, &installer, &installer, config)?;

    let log = config.log_path(&spec.name);
    let options = ExecOptions::default().with_log(&log);
    let result = exec::run_elevated(&path.to_string_lossy(), &[], &options)?;
    if !result.success {
        // Some vendor installers exit nonzero on success; the post-install
        // verification pass is the arbiter.
        tracing::warn!(
            dependency = %spec.name,
            code = ?result.exit_code,
            "installer exited uncleanly, deferring to verification"
        );
    }
    Ok(InstallOutcome::empty())
}

/// Run the language package index's standard setup-script install.
///
/// In local mode the installed files are diverted into the build tree's
/// private library path instead of the system-wide location.
pub fn package_index_install(
    name: &str,
    source_dir: &Path,
    config: &EngineConfig,
) -> Result<InstallOutcome> {
    let log = config.log_path(name);
    if config.install_locally {
        std::fs::create_dir_all(&config.local_lib_dir)?;
        let home = config.local_prefix();
        let lib = config
            .local_lib_dir
            .canonicalize()
            .unwrap_or_else(|_| config.local_lib_dir.clone());
        let options = ExecOptions::in_dir(source_dir)
            .with_log(&log)
            .with_env("PYTHONPATH", &lib.to_string_lossy());
        let args = vec![
            "setup.py".to_string(),
            "build".to_string(),
            "install".to_string(),
            format!("--home={}", home.display()),
            format!("--install-lib={}", lib.display()),
        ];
        run_step(name, &log, "python3", &args, &options, false)?;
    } else {
        let options = ExecOptions::in_dir(source_dir).with_log(&log);
        let args = vec![
            "setup.py".to_string(),
            "build".to_string(),
            "install".to_string(),
        ];
        run_step(name, &log, "python3", &args, &options, true)?;
    }
    Ok(InstallOutcome::empty())
}

fn package_names(packages: &PackageNames, manager: SystemPackageManager) -> Option<String> {
    match manager {
        SystemPackageManager::Homebrew => packages.brew.clone(),
        SystemPackageManager::MacPorts => packages.port.clone(),
        SystemPackageManager::Apt => packages.apt.clone(),
        SystemPackageManager::Yum => packages.yum.clone(),
    }
}

/// Run one external step, translating any failure into `Install`.
fn run_step(
    dependency: &str,
    log: &Path,
    program: &str,
    args: &[String],
    options: &ExecOptions,
    elevated: bool,
) -> Result<()> {
    let result = if elevated {
        exec::run_elevated(program, args, options)
    } else {
        exec::run_logged(program, args, options)
    };
    match result {
        Ok(result) if result.success => Ok(()),
        Ok(_) | Err(CairnError::Command { .. }) => Err(CairnError::Install {
            dependency: dependency.to_string(),
            log: log.to_path_buf(),
        }),
        Err(other) => Err(other),
    }
}

/// Record a note in the dependency's log and produce the install error.
fn fail(dependency: &str, config: &EngineConfig, note: &str) -> CairnError {
    let log = config.log_path(dependency);
    if let Ok(mut file) = exec::open_log(&log) {
        let _ = writeln!(file, "{note}");
    }
    tracing::error!(dependency, note, "install failed");
    CairnError::Install {
        dependency: dependency.to_string(),
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::declared::SourceRecipe;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn source_spec(name: &str, url: &str) -> ProviderSpec {
        ProviderSpec::library(name, &format!("{name}.h"), name).with_source(SourceRecipe {
            url: url.to_string(),
            archive: format!("{name}-{{version}}.tar.gz"),
            dir: None,
            default_version: Some("1.0".into()),
            configure_args: Vec::new(),
        })
    }

    fn packaged_spec(name: &str) -> ProviderSpec {
        ProviderSpec::library(name, &format!("{name}.h"), name).with_packages(PackageNames {
            brew: Some(name.to_string()),
            apt: Some(format!("lib{name}-dev")),
            yum: Some(format!("{name}-devel")),
            port: None,
            installer: None,
            installer_url: None,
        })
    }

    #[test]
    fn local_installs_prefer_source_builds() {
        let spec = source_spec("widget", "http://example.invalid");
        let strategy = select_strategy(
            &spec,
            Platform::Linux,
            Some(SystemPackageManager::Apt),
            true,
        );
        assert_eq!(strategy, Some(InstallStrategy::SourceBuild));
    }

    #[test]
    fn system_installs_prefer_the_package_manager() {
        let spec = packaged_spec("widget");
        let strategy = select_strategy(
            &spec,
            Platform::Linux,
            Some(SystemPackageManager::Apt),
            false,
        );
        assert_eq!(
            strategy,
            Some(InstallStrategy::SystemPackage(SystemPackageManager::Apt))
        );
    }

    #[test]
    fn manager_without_mapping_is_skipped() {
        let mut spec = packaged_spec("widget");
        spec.packages.apt = None;
        spec.source = Some(SourceRecipe {
            url: "http://example.invalid".into(),
            archive: "widget-1.0.tar.gz".into(),
            dir: None,
            default_version: None,
            configure_args: Vec::new(),
        });
        let strategy = select_strategy(
            &spec,
            Platform::Linux,
            Some(SystemPackageManager::Apt),
            false,
        );
        assert_eq!(strategy, Some(InstallStrategy::SourceBuild));
    }

    #[test]
    fn no_options_yields_no_strategy() {
        let spec = ProviderSpec::library("widget", "widget.h", "widget");
        assert_eq!(
            select_strategy(&spec, Platform::Linux, None, false),
            None
        );
    }

    #[test]
    fn windows_falls_back_to_vendor_installer() {
        let mut spec = ProviderSpec::library("widget", "widget.h", "widget");
        spec.packages.installer = Some("widget-{version}.exe".into());
        spec.packages.installer_url = Some("http://example.invalid".into());
        let strategy = select_strategy(&spec, Platform::Windows, None, false);
        assert_eq!(strategy, Some(InstallStrategy::VendorInstaller));
    }

    #[cfg(unix)]
    #[test]
    fn failing_configure_surfaces_install_error_with_log() {
        // Serve a source archive whose configure script fails.
        let server = MockServer::start();
        let temp = TempDir::new().unwrap();
        let mut config = EngineConfig::new(temp.path().join("build"))
            .with_download_dir(temp.path().join("dl"));
        config.install_locally = true;

        let archive_path = temp.path().join("fixture.tar.gz");
        {
            use flate2::{write::GzEncoder, Compression};
            let file = std::fs::File::create(&archive_path).unwrap();
            let encoder = GzEncoder::new(file, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let script = "#!/bin/sh\necho configuring >&2\nexit 1\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(script.len() as u64);
            header.set_mode(0o755);
            header.set_cksum();
            builder
                .append_data(&mut header, "broken-1.0/configure", script.as_bytes())
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }
        let body = std::fs::read(&archive_path).unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/broken-1.0.tar.gz");
            then.status(200).body(body);
        });

        let spec = source_spec("broken", &server.base_url());
        let err = install_declared(&spec, &Fetcher::new(), &config, None).unwrap_err();
        match err {
            CairnError::Install { dependency, log } => {
                assert_eq!(dependency, "broken");
                let contents = std::fs::read_to_string(log).unwrap();
                assert!(contents.contains("$ ./configure"));
                assert!(contents.contains("configuring"));
            }
            other => panic!("expected Install error, got {other:?}"),
        }
    }

    #[test]
    fn missing_strategy_writes_explanatory_log() {
        let temp = TempDir::new().unwrap();
        let mut config = EngineConfig::new(temp.path().join("build"));
        config.install_locally = false;

        let spec = ProviderSpec::library("bare", "bare.h", "bare");
        // Force the no-strategy path regardless of host package managers.
        let err = match select_strategy(&spec, Platform::current(), None, false) {
            None => fail(&spec.name, &config, "no usable install strategy"),
            Some(_) => panic!("spec without recipes must have no strategy"),
        };
        match err {
            CairnError::Install { dependency, log } => {
                assert_eq!(dependency, "bare");
                assert!(std::fs::read_to_string(log)
                    .unwrap()
                    .contains("no usable install strategy"));
            }
            other => panic!("expected Install error, got {other:?}"),
        }
    }
}
