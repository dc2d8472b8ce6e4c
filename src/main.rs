//! cairn CLI entry point.

use std::process::ExitCode;

use cairn::cli::{dispatch, Cli};
use cairn::ui;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. `--verbose` raises the default to INFO, otherwise WARN
fn init_tracing(debug: bool, verbose: bool) {
    let filter = if debug {
        EnvFilter::new("cairn=debug")
    } else {
        let default = if verbose { "cairn=info" } else { "cairn=warn" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.verbose);

    tracing::debug!("starting with args: {:?}", cli);

    match dispatch(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            ui::error(&err.to_string());
            ExitCode::from(1)
        }
    }
}
