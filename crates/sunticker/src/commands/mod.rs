//! Command handlers and the provider wiring they share.

pub mod check;
pub mod probe;
pub mod run;

use std::sync::Arc;

use sunticker_api::WinetClient;
use sunticker_config::Config;
use sunticker_core::{
    ClimateSensor, ClimateSource, DataProvider, IioClimateSensor, InverterSource, Thermometer,
    W1Thermometer,
};
use tracing::debug;

use crate::error::CliError;

/// Data providers built from config.
pub struct Providers {
    pub inverter: Arc<InverterSource<WinetClient>>,
    pub climate: Arc<ClimateSource>,
}

impl Providers {
    /// Probe the local sensors and prepare the (still disconnected) inverter.
    pub async fn build(cfg: &Config) -> Result<Self, CliError> {
        let client = WinetClient::new(cfg.client_config());
        debug!(url = ?client.config().url().ok(), "inverter endpoint");
        let inverter = Arc::new(InverterSource::new(client));

        let sensors = cfg.sensors.clone();
        let retry_delay = cfg.sensor_retry_delay();
        let climate = tokio::task::spawn_blocking(move || {
            let primary = W1Thermometer::discover(&sensors.w1_devices_dir)
                .map(|t| Arc::new(t) as Arc<dyn Thermometer>);
            let fallback: Arc<dyn ClimateSensor> = Arc::new(IioClimateSensor::new(
                sensors.iio_device_dir,
                sensors.read_retries,
                retry_delay,
            ));
            ClimateSource::probe(primary, Some(fallback))
        })
        .await?;

        Ok(Self {
            inverter,
            climate: Arc::new(climate),
        })
    }

    /// Provider serving sources with the given remote flag.
    pub fn for_source(&self, is_remote: bool) -> Arc<dyn DataProvider> {
        if is_remote {
            Arc::clone(&self.inverter) as Arc<dyn DataProvider>
        } else {
            Arc::clone(&self.climate) as Arc<dyn DataProvider>
        }
    }
}
