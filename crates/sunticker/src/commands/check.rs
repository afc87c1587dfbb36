//! `sunticker check`: print the resolved configuration.

use std::io::{self, Write};

use sunticker_config::Config;

use crate::drivers::MatrixGeometry;
use crate::error::CliError;

pub fn handle(cfg: &Config) -> Result<(), CliError> {
    let rotation = cfg.source_sequence()?;
    let schedule = cfg.scheduler_config()?;
    let client = cfg.client_config();
    let url = client
        .url()
        .map_or_else(|e| format!("<{e}>"), |u| u.to_string());

    let mut out = io::stdout().lock();
    writeln!(out, "inverter  {url} (timeout {}s)", cfg.inverter.timeout_secs)?;
    writeln!(out, "matrix    {}", MatrixGeometry::from(&cfg.matrix))?;
    writeln!(
        out,
        "segment   {} digits",
        usize::from(cfg.segment.cascaded) * sunticker_core::DIGITS_PER_MODULE
    )?;
    writeln!(
        out,
        "night     {} - {} (refresh every {}s)",
        cfg.schedule.night_start,
        cfg.schedule.night_end,
        schedule.refresh_period.as_secs()
    )?;
    writeln!(out, "rotation")?;
    for (i, source) in rotation.iter().enumerate() {
        writeln!(
            out,
            "  {:>2}. {:<26} {:<18} [{}]  {:<6} {}s",
            i + 1,
            source.key,
            source.display_name,
            source.alias_label,
            if source.is_remote { "remote" } else { "local" },
            source.dwell_secs
        )?;
    }
    Ok(())
}
