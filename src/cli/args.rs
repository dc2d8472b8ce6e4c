//! CLI argument definitions.
//!
//! All arguments are declared with clap's derive macros; [`Cli`] is the
//! entry point. Global flags map one-to-one onto [`EngineConfig`] fields so
//! the rest of the crate never touches the CLI layer.
//!
//! [`EngineConfig`]: crate::config::EngineConfig

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// cairn - prerequisite resolution and installation orchestrator.
#[derive(Debug, Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Build directory for local installs, logs, and the cache
    #[arg(long, global = true, default_value = "build")]
    pub build_dir: PathBuf,

    /// Shared download cache directory
    #[arg(long, global = true, default_value = "third_party")]
    pub download_dir: PathBuf,

    /// Directory of provider override definitions
    #[arg(long, global = true)]
    pub override_dir: Option<PathBuf>,

    /// Base URL of the language package index
    #[arg(long, global = true, env = "CAIRN_INDEX_URL")]
    pub index_url: Option<String>,

    /// Install system-wide instead of into the build tree
    #[arg(long, global = true)]
    pub system: bool,

    /// Only check, never install
    #[arg(long, global = true)]
    pub no_install: bool,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve and install the given requirements
    Resolve(ResolveArgs),

    /// Run a command in every nested build unit
    Batch(BatchArgs),

    /// List resolvable provider names
    Providers,

    /// Delete the configuration cache
    Clean,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `resolve` command.
#[derive(Debug, Clone, clap::Args)]
pub struct ResolveArgs {
    /// Requirement expressions (`zlib`, `boost>=1.44`, `hdf5==1.8.9`)
    #[arg(required = true)]
    pub specs: Vec<String>,

    /// Print the resulting environment
    #[arg(long)]
    pub show_env: bool,
}

/// Arguments for the `batch` command.
#[derive(Debug, Clone, clap::Args)]
pub struct BatchArgs {
    /// Command to re-invoke in each unit
    pub command: String,

    /// Build units as name=directory pairs
    #[arg(long = "unit", required = true)]
    pub units: Vec<String>,

    /// Worker count for parallel mode (omit for sequential)
    #[arg(long)]
    pub parallel: Option<usize>,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_resolve_with_specs() {
        let cli = Cli::try_parse_from(["cairn", "resolve", "zlib", "boost>=1.44"]).unwrap();
        match cli.command {
            Some(Commands::Resolve(args)) => {
                assert_eq!(args.specs, vec!["zlib", "boost>=1.44"]);
            }
            other => panic!("expected resolve, got {other:?}"),
        }
    }

    #[test]
    fn resolve_requires_at_least_one_spec() {
        assert!(Cli::try_parse_from(["cairn", "resolve"]).is_err());
    }

    #[test]
    fn global_flags_apply_anywhere() {
        let cli = Cli::try_parse_from([
            "cairn",
            "resolve",
            "zlib",
            "--build-dir",
            "out",
            "--no-install",
            "--system",
        ])
        .unwrap();
        assert_eq!(cli.build_dir, PathBuf::from("out"));
        assert!(cli.no_install);
        assert!(cli.system);
    }

    #[test]
    fn parses_batch_units() {
        let cli = Cli::try_parse_from([
            "cairn", "batch", "build", "--unit", "core=pkg/core", "--unit", "gui=pkg/gui",
            "--parallel", "4",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Batch(args)) => {
                assert_eq!(args.command, "build");
                assert_eq!(args.units.len(), 2);
                assert_eq!(args.parallel, Some(4));
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_conventions() {
        let cli = Cli::try_parse_from(["cairn", "providers"]).unwrap();
        assert_eq!(cli.build_dir, PathBuf::from("build"));
        assert_eq!(cli.download_dir, PathBuf::from("third_party"));
        assert!(!cli.system);
    }
}
