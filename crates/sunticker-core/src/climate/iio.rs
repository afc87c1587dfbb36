// DHT11 through the Linux IIO `dht11` driver.
//
// The driver exposes milli-degree and milli-percent values as sysfs
// attributes. Reads fail with EIO when the single-wire handshake
// misses, which is routine; callers retry.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use tracing::trace;

use super::{ClimateSample, ClimateSensor};

const TEMPERATURE_ATTR: &str = "in_temp_input";
const HUMIDITY_ATTR: &str = "in_humidityrelative_input";

#[derive(Debug, Clone)]
pub struct IioClimateSensor {
    device_dir: PathBuf,
    attempts: u32,
    retry_delay: Duration,
}

impl IioClimateSensor {
    /// `attempts` is clamped to at least one.
    pub fn new(device_dir: impl Into<PathBuf>, attempts: u32, retry_delay: Duration) -> Self {
        Self {
            device_dir: device_dir.into(),
            attempts: attempts.max(1),
            retry_delay,
        }
    }

    pub fn device_dir(&self) -> &Path {
        &self.device_dir
    }

    fn read_attr(&self, attr: &str) -> Option<f64> {
        let path = self.device_dir.join(attr);
        match fs::read_to_string(&path) {
            Ok(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .map(|milli| milli / 1000.0),
            Err(e) => {
                trace!(file = %path.display(), error = %e, "iio attribute unreadable");
                None
            }
        }
    }
}

impl ClimateSensor for IioClimateSensor {
    /// Retry until both quantities are read or attempts run out, keeping
    /// the latest value seen for each.
    fn read(&self) -> ClimateSample {
        let mut sample = ClimateSample::default();

        for attempt in 0..self.attempts {
            if attempt > 0 {
                thread::sleep(self.retry_delay);
            }
            if let Some(t) = self.read_attr(TEMPERATURE_ATTR) {
                sample.temperature = Some(t);
            }
            if let Some(h) = self.read_attr(HUMIDITY_ATTR) {
                sample.humidity = Some(h);
            }
            if sample.temperature.is_some() && sample.humidity.is_some() {
                break;
            }
        }

        sample
    }
}
