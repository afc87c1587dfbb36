//! Clap derive structures for the `sunticker` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sunticker -- solar and climate ticker for LED displays
#[derive(Debug, Parser)]
#[command(
    name = "sunticker",
    version,
    about = "Rotate solar inverter and room climate readings across LED displays",
    long_about = "Cycles through configured data sources, showing each source's name on a\n\
        dot-matrix display and its live value on a seven-segment display.\n\n\
        Inverter values come from the WiNet WebSocket service; temperature and\n\
        humidity come from local 1-wire and IIO sensors.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "SUNTICKER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive the displays until interrupted (SIGUSR1 pauses rotation)
    Run,

    /// Validate the configuration and print the resolved rotation
    Check,

    /// Query every configured source once and print the values
    Probe,
}
