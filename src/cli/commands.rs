//! Command implementations.

use crate::cache;
use crate::cli::args::{BatchArgs, Cli, Commands, CompletionsArgs, ResolveArgs};
use crate::config::EngineConfig;
use crate::depspec::DependencySpec;
use crate::engine::ResolutionEngine;
use crate::environment::EnvValue;
use crate::error::{CairnError, Result};
use crate::provider::{overrides, ProviderRegistry};
use crate::subpackage::{BuildUnit, Mode, Orchestrator};
use crate::ui;
use clap::CommandFactory;
use std::path::PathBuf;

/// Dispatch a parsed command line, returning the process exit code.
pub fn dispatch(cli: &Cli) -> Result<i32> {
    let config = engine_config(cli);
    match &cli.command {
        Some(Commands::Resolve(args)) => resolve(args, config, cli.quiet),
        Some(Commands::Batch(args)) => batch(args, config, cli),
        Some(Commands::Providers) => providers(&config),
        Some(Commands::Clean) => clean(&config),
        Some(Commands::Completions(args)) => completions(args),
        None => {
            Cli::command().print_help().ok();
            Ok(2)
        }
    }
}

/// Build the engine configuration from global flags.
fn engine_config(cli: &Cli) -> EngineConfig {
    let mut config = EngineConfig::new(&cli.build_dir).with_download_dir(&cli.download_dir);
    if let Some(dir) = &cli.override_dir {
        config = config.with_override_dir(dir);
    }
    if let Some(url) = &cli.index_url {
        config = config.with_index_url(url.clone());
    }
    config.install = !cli.no_install;
    config.install_locally = !cli.system;
    config
}

fn resolve(args: &ResolveArgs, config: EngineConfig, quiet: bool) -> Result<i32> {
    let specs = args
        .specs
        .iter()
        .map(|expr| DependencySpec::parse(expr))
        .collect::<Result<Vec<_>>>()?;

    let mut engine = ResolutionEngine::new(config, ProviderRegistry::new());
    engine.resolve_all(&specs)?;

    if !quiet {
        for spec in &specs {
            ui::success(&spec.name);
        }
    }
    if args.show_env {
        for (key, value) in engine.environment().iter() {
            match value {
                EnvValue::Str(s) => ui::status(&format!("{key} = {s}")),
                EnvValue::List(items) => ui::status(&format!("{key} = {}", items.join(" "))),
                EnvValue::Absent => ui::status(&format!("{key} =")),
            }
        }
    }
    Ok(0)
}

fn batch(args: &BatchArgs, config: EngineConfig, cli: &Cli) -> Result<i32> {
    let units = args
        .units
        .iter()
        .map(|raw| parse_unit(raw))
        .collect::<Result<Vec<_>>>()?;

    let orchestrator = Orchestrator::new(&config, passthrough_args(cli));
    let mode = match args.parallel {
        Some(workers) => Mode::Parallel { workers },
        None => Mode::Sequential,
    };
    let results = orchestrator.run(&units, &args.command, mode)?;
    for result in &results {
        ui::success(&result.name);
    }
    Ok(0)
}

/// Parse a `name=directory` unit declaration.
fn parse_unit(raw: &str) -> Result<BuildUnit> {
    let Some((name, dir)) = raw.split_once('=') else {
        return Err(CairnError::Config {
            message: format!("unit '{raw}' must be name=directory"),
        });
    };
    Ok(BuildUnit::new(name.trim(), PathBuf::from(dir.trim())))
}

/// Global flags a sub-invocation should inherit.
fn passthrough_args(cli: &Cli) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(dir) = &cli.override_dir {
        args.push("--override-dir".to_string());
        args.push(dir.to_string_lossy().to_string());
    }
    if let Some(url) = &cli.index_url {
        args.push("--index-url".to_string());
        args.push(url.clone());
    }
    if cli.system {
        args.push("--system".to_string());
    }
    if cli.no_install {
        args.push("--no-install".to_string());
    }
    if cli.verbose {
        args.push("--verbose".to_string());
    }
    if cli.quiet {
        args.push("--quiet".to_string());
    }
    if cli.debug {
        args.push("--debug".to_string());
    }
    args
}

fn providers(config: &EngineConfig) -> Result<i32> {
    let registry = ProviderRegistry::new();
    let mut names: Vec<String> = registry
        .registered_names()
        .into_iter()
        .map(String::from)
        .collect();
    if let Some(dir) = &config.override_dir {
        for name in overrides::available(dir) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names.sort();
    for name in names {
        ui::status(&name);
    }
    Ok(0)
}

fn clean(config: &EngineConfig) -> Result<i32> {
    cache::delete(config)?;
    ui::status("configuration cache removed");
    Ok(0)
}

fn completions(args: &CompletionsArgs) -> Result<i32> {
    let mut command = Cli::command();
    clap_complete::generate(args.shell, &mut command, "cairn", &mut std::io::stdout());
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn engine_config_reflects_flags() {
        let cli = Cli::try_parse_from([
            "cairn",
            "resolve",
            "zlib",
            "--build-dir",
            "out",
            "--download-dir",
            "dl",
            "--no-install",
            "--system",
        ])
        .unwrap();
        let config = engine_config(&cli);
        assert_eq!(config.build_dir, PathBuf::from("out"));
        assert_eq!(config.download_dir, PathBuf::from("dl"));
        assert!(!config.install);
        assert!(!config.install_locally);
    }

    #[test]
    fn parse_unit_splits_name_and_directory() {
        let unit = parse_unit("core=packages/core").unwrap();
        assert_eq!(unit.name, "core");
        assert_eq!(unit.directory, PathBuf::from("packages/core"));
    }

    #[test]
    fn parse_unit_rejects_missing_equals() {
        assert!(parse_unit("just-a-name").is_err());
    }

    #[test]
    fn passthrough_keeps_only_global_flags() {
        let cli = Cli::try_parse_from([
            "cairn",
            "batch",
            "build",
            "--unit",
            "a=b",
            "--quiet",
            "--system",
        ])
        .unwrap();
        let args = passthrough_args(&cli);
        assert!(args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"--system".to_string()));
        assert!(!args.iter().any(|a| a == "--unit" || a == "a=b"));
    }
}
