mod cli;
mod commands;
mod drivers;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sunticker_config::Config;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Frames go to stdout; logs stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let cfg = load(&cli.global)?;
    tracing::debug!(command = ?cli.command, "dispatching command");

    match cli.command {
        Command::Run => commands::run::handle(&cfg).await,
        Command::Check => commands::check::handle(&cfg),
        Command::Probe => commands::probe::handle(&cfg).await,
    }
}

/// Load and validate config from `--config` or the platform location.
fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = global
        .config
        .clone()
        .unwrap_or_else(sunticker_config::config_path);
    sunticker_config::load_config(Some(&path)).map_err(|e| CliError::config(e, &path))
}
