// DS18B20 through the Linux `w1_therm` driver.
//
// The driver exposes a two-line text file per device:
//
//   72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//   72 01 4b 46 7f ff 0e 10 57 t=23125
//
// `t=` is milli-degrees Celsius. A CRC of zero together with t=0 is what
// an unplugged or never-attached sensor looks like.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use super::Thermometer;

/// Family code prefix of DS18B20 devices on the 1-wire bus.
const DS18B20_FAMILY: &str = "28";
/// Pattern substituted when the device file cannot be read.
const ZERO_PATTERN: &str = ". crc=00\n. t=0\n";

#[derive(Debug, Clone)]
pub struct W1Thermometer {
    device_file: PathBuf,
}

impl W1Thermometer {
    pub fn new(device_file: impl Into<PathBuf>) -> Self {
        Self {
            device_file: device_file.into(),
        }
    }

    /// First DS18B20 under `devices_dir` (sorted by id), if any.
    pub fn discover(devices_dir: &Path) -> Option<Self> {
        let entries = match fs::read_dir(devices_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %devices_dir.display(), error = %e, "1-wire bus not available");
                return None;
            }
        };

        let mut ids: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(DS18B20_FAMILY))
            .map(|e| e.path())
            .collect();
        ids.sort();

        let device = ids.into_iter().next()?;
        debug!(device = %device.display(), "found DS18B20");
        Some(Self::new(device.join("w1_slave")))
    }

    pub fn device_file(&self) -> &Path {
        &self.device_file
    }

    fn read_raw(&self) -> String {
        fs::read_to_string(&self.device_file).unwrap_or_else(|e| {
            trace!(file = %self.device_file.display(), error = %e, "w1_slave unreadable");
            ZERO_PATTERN.to_owned()
        })
    }
}

impl Thermometer for W1Thermometer {
    fn read_celsius(&self) -> Option<f64> {
        parse_w1_slave(&self.read_raw())
    }
}

/// Parse `w1_slave` contents into degrees Celsius.
///
/// Returns `None` for the all-zero pattern, a failed CRC check, or
/// anything unparseable.
pub fn parse_w1_slave(text: &str) -> Option<f64> {
    let mut lines = text.lines();
    let crc_line = lines.next()?.trim();
    let temp_line = lines.next()?.trim();

    let crc_field = crc_line.rsplit("crc=").next()?;
    let crc = u8::from_str_radix(crc_field.get(..2)?, 16).ok()?;
    let milli: i32 = temp_line.rsplit("t=").next()?.trim().parse().ok()?;

    if crc == 0 && milli == 0 {
        return None;
    }
    if crc_line.contains(':') && !crc_line.ends_with("YES") {
        return None;
    }

    Some(f64::from(milli) / 1000.0)
}
