//! `sunticker probe`: read every configured source once.

use std::io::{self, Write};

use sunticker_config::Config;

use super::Providers;
use crate::error::CliError;

pub async fn handle(cfg: &Config) -> Result<(), CliError> {
    let rotation = cfg.source_sequence()?;
    let providers = Providers::build(cfg).await?;

    let mut lines = Vec::with_capacity(rotation.len());
    for source in rotation.iter() {
        let provider = providers.for_source(source.is_remote);
        let line = match provider.get_value(&source.key).await {
            Ok(value) => format!("{} = {value}", source.key),
            Err(absence) => format!("{} = no data ({absence})", source.key),
        };
        lines.push(line);
    }
    providers.inverter.disconnect().await;

    let mut out = io::stdout().lock();
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
