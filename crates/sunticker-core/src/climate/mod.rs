//! Local temperature and humidity.
//!
//! Two sensors: a high-precision primary thermometer and a low-precision
//! fallback that also measures humidity. Each is probed exactly once in
//! [`ClimateSource::probe`]; a sensor that does not answer then is
//! dropped for the lifetime of the process, even if attached later.

mod iio;
mod w1;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::provider::DataProvider;
use crate::reading::{Absence, FaultClass, Measurement, Reading};

pub use iio::IioClimateSensor;
pub use w1::{W1Thermometer, parse_w1_slave};

/// Key served by [`ClimateSource::get_temperature`].
pub const TEMPERATURE_KEY: &str = "temperature";
/// Key served by [`ClimateSource::get_humidity`].
pub const HUMIDITY_KEY: &str = "humidity";

/// High-precision thermometer. `None` means no valid value.
pub trait Thermometer: Send + Sync {
    fn read_celsius(&self) -> Option<f64>;
}

/// Combined temperature/humidity sensor.
pub trait ClimateSensor: Send + Sync {
    fn read(&self) -> ClimateSample;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClimateSample {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl ClimateSample {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }
}

/// Startup probe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPresence {
    pub primary: bool,
    pub fallback: bool,
}

/// Data provider over the local sensors. Cheap to clone.
#[derive(Clone)]
pub struct ClimateSource {
    primary: Option<Arc<dyn Thermometer>>,
    fallback: Option<Arc<dyn ClimateSensor>>,
}

impl ClimateSource {
    /// Read each sensor once and keep only those that answered.
    ///
    /// Blocking: sensor reads may retry with delays.
    pub fn probe(
        primary: Option<Arc<dyn Thermometer>>,
        fallback: Option<Arc<dyn ClimateSensor>>,
    ) -> Self {
        let primary = primary.filter(|sensor| sensor.read_celsius().is_some());
        let fallback = fallback.filter(|sensor| !sensor.read().is_empty());

        let source = Self { primary, fallback };
        let presence = source.presence();
        info!(
            primary = presence.primary,
            fallback = presence.fallback,
            "climate sensors probed"
        );
        if !presence.primary && !presence.fallback {
            warn!("no climate sensor present; temperature and humidity will show no data");
        }
        source
    }

    pub fn presence(&self) -> SensorPresence {
        SensorPresence {
            primary: self.primary.is_some(),
            fallback: self.fallback.is_some(),
        }
    }

    /// Primary sensor first (one decimal), fallback second (whole degrees).
    pub fn get_temperature(&self) -> Reading {
        if let Some(ref primary) = self.primary {
            if let Some(celsius) = primary.read_celsius() {
                return Ok(Measurement::new(celsius).rounded(1));
            }
            debug!("primary thermometer gave no valid value, trying fallback");
        }

        let Some(ref fallback) = self.fallback else {
            return Err(if self.primary.is_some() {
                Absence::ReadFailed
            } else {
                Absence::SensorAbsent
            });
        };

        fallback
            .read()
            .temperature
            .map(|t| Measurement::new(t.trunc()))
            .ok_or(Absence::ReadFailed)
    }

    /// Fallback sensor only, whole percent.
    pub fn get_humidity(&self) -> Reading {
        let Some(ref fallback) = self.fallback else {
            return Err(Absence::SensorAbsent);
        };
        fallback
            .read()
            .humidity
            .map(|h| Measurement::new(h.trunc()))
            .ok_or(Absence::ReadFailed)
    }

    /// Dispatch by key. Blocking; see [`DataProvider::get_value`] for the
    /// async wrapper.
    pub fn read_blocking(&self, key: &str) -> Reading {
        match key {
            TEMPERATURE_KEY => self.get_temperature(),
            HUMIDITY_KEY => self.get_humidity(),
            other => {
                warn!(key = other, "no local sensor serves this item");
                Err(Absence::UnknownKey {
                    key: other.to_owned(),
                })
            }
        }
    }
}

impl DataProvider for ClimateSource {
    fn name(&self) -> &str {
        "climate"
    }

    fn get_value<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Reading> {
        let source = self.clone();
        let owned_key = key.to_owned();
        Box::pin(async move {
            match tokio::task::spawn_blocking(move || source.read_blocking(&owned_key)).await {
                Ok(reading) => reading,
                Err(e) => {
                    warn!(key, error = %e, "climate sensor read aborted");
                    Err(Absence::Fault(FaultClass::Unexpected))
                }
            }
        })
    }
}
