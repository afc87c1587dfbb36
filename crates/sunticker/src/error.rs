//! CLI error types with miette diagnostics.

use std::path::Path;

use miette::Diagnostic;
use thiserror::Error;

use sunticker_config::ConfigError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 3;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration is invalid")]
    #[diagnostic(
        code(sunticker::config),
        help(
            "Check the config file and any SUNTICKER_* environment variables.\n\
             Expected at: {path}\n\
             Validate with: sunticker check"
        )
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(sunticker::validation),
        help("Fix the setting in the config file or its SUNTICKER_* override.")
    )]
    Validation { field: String, reason: String },

    // ── Runtime ──────────────────────────────────────────────────────

    #[error("Background task failed")]
    #[diagnostic(code(sunticker::task))]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::config(err, &sunticker_config::config_path())
    }
}

impl CliError {
    /// Wrap a config failure, naming the file it came from.
    pub fn config(err: ConfigError, path: &Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config {
                path: path.display().to_string(),
                source: other,
            },
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::Validation { .. } => exit_code::CONFIG,
            Self::Task(_) | Self::Io(_) => exit_code::GENERAL,
        }
    }
}
