//! `sunticker run`: drive the displays until interrupted.

use std::sync::Arc;
use std::time::Duration;

use sunticker_config::Config;
use sunticker_core::{RotationScheduler, SchedulerParts, SystemClock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Providers;
use crate::drivers::{ConsoleMatrix, ConsoleSegment, MatrixGeometry};
use crate::error::CliError;

pub async fn handle(cfg: &Config) -> Result<(), CliError> {
    let sources = cfg.source_sequence()?;
    let scheduler_config = cfg.scheduler_config()?;
    let providers = Providers::build(cfg).await?;

    let scheduler = RotationScheduler::new(
        SchedulerParts {
            sources,
            remote: providers.for_source(true),
            local: providers.for_source(false),
            matrix: Box::new(ConsoleMatrix::stdout(MatrixGeometry::from(&cfg.matrix))),
            segment: Box::new(ConsoleSegment::stdout(cfg.segment.cascaded)),
            clock: Arc::new(SystemClock),
        },
        scheduler_config,
    );

    let cancel = CancellationToken::new();
    let shutdown = spawn_shutdown_listener(cancel.clone())?;
    let pauses = spawn_pause_listener(scheduler.clone(), cfg.pause_duration(), cancel.clone())?;

    scheduler.start().await;
    cancel.cancelled().await;

    info!("shutting down");
    scheduler.stop().await;
    providers.inverter.disconnect().await;

    shutdown.abort();
    if let Err(e) = pauses.await {
        warn!(error = %e, "pause listener ended abnormally");
    }
    Ok(())
}

/// Cancel `cancel` on Ctrl-C or SIGTERM.
#[cfg(unix)]
fn spawn_shutdown_listener(cancel: CancellationToken) -> Result<JoinHandle<()>, CliError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    Ok(tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "cannot listen for Ctrl-C, waiting for SIGTERM");
                    term.recv().await;
                }
            }
            _ = term.recv() => info!("received SIGTERM"),
        }
        cancel.cancel();
    }))
}

#[cfg(not(unix))]
fn spawn_shutdown_listener(cancel: CancellationToken) -> Result<JoinHandle<()>, CliError> {
    Ok(tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for Ctrl-C");
        }
        cancel.cancel();
    }))
}

/// Pause the rotation for `hold` on every SIGUSR1 until `cancel` fires.
///
/// Each pause runs in its own task so signals keep being received.
#[cfg(unix)]
fn spawn_pause_listener(
    scheduler: RotationScheduler,
    hold: Duration,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, CliError> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut usr1 = signal(SignalKind::user_defined1())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                received = usr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!(?hold, "pause requested");
                    let scheduler = scheduler.clone();
                    tokio::spawn(async move { scheduler.pause(hold).await });
                }
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_pause_listener(
    _scheduler: RotationScheduler,
    _hold: Duration,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>, CliError> {
    Ok(tokio::spawn(async move { cancel.cancelled().await }))
}
