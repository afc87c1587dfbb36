//! Configuration for sunticker.
//!
//! TOML file plus `SUNTICKER_` environment overrides, validated and
//! translated into the types `sunticker-core` and `sunticker-api` consume.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sunticker_api::{ClientConfig, Credentials, DEFAULT_PORT};
use sunticker_core::{
    Brightness, BrightnessPolicy, SchedulerConfig, SourceDescriptor, SourceSequence,
};

/// Environment variable prefix; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "SUNTICKER_";

/// Password override that never needs to live in the config file.
pub const PASSWORD_ENV: &str = "SUNTICKER_INVERTER_PASSWORD";

const TIME_FORMAT: &str = "%H:%M";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub inverter: InverterSection,

    /// Rotation order; every entry is shown in turn.
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceEntry>,

    #[serde(default)]
    pub matrix: MatrixSection,

    #[serde(default)]
    pub segment: SegmentSection,

    #[serde(default)]
    pub schedule: ScheduleSection,

    #[serde(default)]
    pub sensors: SensorsSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inverter: InverterSection::default(),
            sources: default_sources(),
            matrix: MatrixSection::default(),
            segment: SegmentSection::default(),
            schedule: ScheduleSection::default(),
            sensors: SensorsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InverterSection {
    /// Inverter address, e.g. "192.168.178.47". Required.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Use `wss://` instead of `ws://`.
    #[serde(default)]
    pub secure: bool,

    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    pub username: Option<String>,

    /// Plaintext password (prefer `SUNTICKER_INVERTER_PASSWORD`).
    pub password: Option<String>,
}

impl Default for InverterSection {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            secure: false,
            locale: default_locale(),
            timeout_secs: default_timeout(),
            username: None,
            password: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_locale() -> String {
    "en_US".into()
}
fn default_timeout() -> u64 {
    5
}

/// One rotation entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceEntry {
    /// Provider key (`total_dcpower`, `temperature`, ...).
    pub key: String,
    /// Scrolling label.
    pub name: String,
    /// Static caption with unit.
    pub alias: String,
    /// Served by the inverter.
    #[serde(default)]
    pub remote: bool,
    pub dwell_secs: u64,
}

impl SourceEntry {
    fn new(key: &str, name: &str, alias: &str, remote: bool, dwell_secs: u64) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            alias: alias.into(),
            remote,
            dwell_secs,
        }
    }
}

fn default_sources() -> Vec<SourceEntry> {
    vec![
        SourceEntry::new("total_dcpower", "PV-in", "P W", true, 20),
        SourceEntry::new("load_total_active_power", "Verbrauch", "V W", true, 20),
        SourceEntry::new("battery_soc", "Batterie", "B %", true, 5),
        SourceEntry::new("temperature", "Temperatur", "T C", false, 5),
        SourceEntry::new("humidity", "Luftfeuchtigkeit", "L %", false, 5),
    ]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixSection {
    /// Number of chained 8x8 modules.
    #[serde(default = "default_matrix_cascaded")]
    pub cascaded: u8,

    /// Per-module orientation in degrees: 0, 90, or -90.
    #[serde(default)]
    pub block_orientation: i16,

    /// Whole-display rotation in quarter turns.
    #[serde(default = "default_matrix_rotate")]
    pub rotate: u8,

    #[serde(default)]
    pub reverse_blocks: bool,

    #[serde(default = "default_matrix_brightness")]
    pub brightness: i64,
}

impl Default for MatrixSection {
    fn default() -> Self {
        Self {
            cascaded: default_matrix_cascaded(),
            block_orientation: 0,
            rotate: default_matrix_rotate(),
            reverse_blocks: false,
            brightness: default_matrix_brightness(),
        }
    }
}

fn default_matrix_cascaded() -> u8 {
    2
}
fn default_matrix_rotate() -> u8 {
    2
}
fn default_matrix_brightness() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SegmentSection {
    /// Number of chained 8-digit modules.
    #[serde(default = "default_segment_cascaded")]
    pub cascaded: u8,

    #[serde(default = "default_segment_brightness")]
    pub brightness: i64,
}

impl Default for SegmentSection {
    fn default() -> Self {
        Self {
            cascaded: default_segment_cascaded(),
            brightness: default_segment_brightness(),
        }
    }
}

fn default_segment_cascaded() -> u8 {
    1
}
fn default_segment_brightness() -> i64 {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleSection {
    /// Start of the dim window, "HH:MM" local time.
    #[serde(default = "default_night_start")]
    pub night_start: String,

    /// End of the dim window, "HH:MM" local time (inclusive).
    #[serde(default = "default_night_end")]
    pub night_end: String,

    /// Seconds between value refreshes of the current source.
    #[serde(default = "default_refresh")]
    pub refresh_secs: u64,

    /// Hold time for an external pause request.
    #[serde(default = "default_pause")]
    pub pause_secs: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            night_start: default_night_start(),
            night_end: default_night_end(),
            refresh_secs: default_refresh(),
            pause_secs: default_pause(),
        }
    }
}

fn default_night_start() -> String {
    "20:00".into()
}
fn default_night_end() -> String {
    "08:00".into()
}
fn default_refresh() -> u64 {
    1
}
fn default_pause() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorsSection {
    /// 1-wire devices directory scanned for a DS18B20.
    #[serde(default = "default_w1_dir")]
    pub w1_devices_dir: PathBuf,

    /// IIO device directory of the DHT11.
    #[serde(default = "default_iio_dir")]
    pub iio_device_dir: PathBuf,

    #[serde(default = "default_read_retries")]
    pub read_retries: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for SensorsSection {
    fn default() -> Self {
        Self {
            w1_devices_dir: default_w1_dir(),
            iio_device_dir: default_iio_dir(),
            read_retries: default_read_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_w1_dir() -> PathBuf {
    "/sys/bus/w1/devices".into()
}
fn default_iio_dir() -> PathBuf {
    "/sys/bus/iio/devices/iio:device0".into()
}
fn default_read_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "sunticker", "sunticker").map_or_else(
        || PathBuf::from("/etc/sunticker/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Layer defaults, the TOML file at `path` (if present), and environment.
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate the config. `path` overrides the platform location.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment_for(&path).extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML at `path`, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation ──────────────────────────────────────────────────────

impl Config {
    /// Check every constraint the runtime relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.inverter.host.trim().is_empty() {
            return Err(ConfigError::invalid("inverter.host", "must be set"));
        }
        if self.inverter.timeout_secs == 0 {
            return Err(ConfigError::invalid("inverter.timeout_secs", "must be at least 1"));
        }

        if self.sources.is_empty() {
            return Err(ConfigError::invalid("sources", "at least one source is required"));
        }
        let mut seen = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            if source.key.trim().is_empty() {
                return Err(ConfigError::invalid(format!("sources[{i}].key"), "must not be empty"));
            }
            if !seen.insert(source.key.as_str()) {
                return Err(ConfigError::invalid(
                    format!("sources[{i}].key"),
                    format!("duplicate key '{}'", source.key),
                ));
            }
            if source.dwell_secs == 0 {
                return Err(ConfigError::invalid(
                    format!("sources[{i}].dwell_secs"),
                    "must be at least 1",
                ));
            }
        }

        check_cascade("matrix.cascaded", self.matrix.cascaded)?;
        check_cascade("segment.cascaded", self.segment.cascaded)?;
        if self.matrix.rotate > 3 {
            return Err(ConfigError::invalid(
                "matrix.rotate",
                format!("expected 0..=3, got {}", self.matrix.rotate),
            ));
        }
        if ![0, 90, -90].contains(&self.matrix.block_orientation) {
            return Err(ConfigError::invalid(
                "matrix.block_orientation",
                format!("expected 0, 90, or -90, got {}", self.matrix.block_orientation),
            ));
        }
        check_brightness("matrix.brightness", self.matrix.brightness)?;
        check_brightness("segment.brightness", self.segment.brightness)?;

        parse_time("schedule.night_start", &self.schedule.night_start)?;
        parse_time("schedule.night_end", &self.schedule.night_end)?;
        if self.schedule.refresh_secs == 0 {
            return Err(ConfigError::invalid("schedule.refresh_secs", "must be at least 1"));
        }

        Ok(())
    }
}

fn check_cascade(field: &str, cascaded: u8) -> Result<(), ConfigError> {
    if cascaded == 0 {
        return Err(ConfigError::invalid(field, "must be at least 1"));
    }
    Ok(())
}

fn check_brightness(field: &str, level: i64) -> Result<(), ConfigError> {
    let max = i64::from(Brightness::MAX.level());
    if !(0..=max).contains(&level) {
        return Err(ConfigError::invalid(
            field,
            format!("expected 0..={max}, got {level}"),
        ));
    }
    Ok(())
}

fn parse_time(field: &str, text: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
        .map_err(|e| ConfigError::invalid(field, format!("expected HH:MM, got '{text}' ({e})")))
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// The rotation as the scheduler consumes it.
    pub fn source_sequence(&self) -> Result<SourceSequence, ConfigError> {
        let descriptors = self
            .sources
            .iter()
            .map(|s| SourceDescriptor {
                key: s.key.clone(),
                display_name: s.name.clone(),
                alias_label: s.alias.clone(),
                is_remote: s.remote,
                dwell_secs: s.dwell_secs,
            })
            .collect();
        SourceSequence::new(descriptors).map_err(|e| ConfigError::invalid("sources", e.to_string()))
    }

    pub fn brightness_policy(&self) -> Result<BrightnessPolicy, ConfigError> {
        let start = parse_time("schedule.night_start", &self.schedule.night_start)?;
        let end = parse_time("schedule.night_end", &self.schedule.night_end)?;
        Ok(BrightnessPolicy::new(start, end))
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        Ok(SchedulerConfig {
            brightness: self.brightness_policy()?,
            matrix_brightness: Brightness::new(self.matrix.brightness),
            segment_brightness: Brightness::new(self.segment.brightness),
            refresh_period: Duration::from_secs(self.schedule.refresh_secs),
        })
    }

    pub fn pause_duration(&self) -> Duration {
        Duration::from_secs(self.schedule.pause_secs)
    }

    pub fn sensor_retry_delay(&self) -> Duration {
        Duration::from_millis(self.sensors.retry_delay_ms)
    }

    /// Build the inverter client config, resolving the password.
    pub fn client_config(&self) -> ClientConfig {
        let inv = &self.inverter;
        let mut cfg = ClientConfig::new(inv.host.trim());
        cfg.port = inv.port;
        cfg.secure = inv.secure;
        cfg.locale.clone_from(&inv.locale);
        cfg.timeout = Duration::from_secs(inv.timeout_secs);
        cfg.credentials = inv.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: resolve_password(inv),
        });
        cfg
    }
}

/// `SUNTICKER_INVERTER_PASSWORD`, then plaintext config, then empty.
fn resolve_password(inv: &InverterSection) -> SecretString {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        return SecretString::from(pw);
    }
    SecretString::from(inv.password.clone().unwrap_or_default())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn with_host() -> Config {
        let mut cfg = Config::default();
        cfg.inverter.host = "192.168.178.47".into();
        cfg
    }

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_reference_installation() {
        let cfg = Config::default();
        assert_eq!(cfg.inverter.port, 8082);
        assert_eq!(cfg.inverter.locale, "en_US");
        assert_eq!(cfg.matrix.cascaded, 2);
        assert_eq!(cfg.matrix.rotate, 2);
        assert_eq!(cfg.segment.brightness, 4);

        let keys: Vec<_> = cfg.sources.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "total_dcpower",
                "load_total_active_power",
                "battery_soc",
                "temperature",
                "humidity"
            ]
        );
        let dwell: Vec<_> = cfg.sources.iter().map(|s| s.dwell_secs).collect();
        assert_eq!(dwell, [20, 20, 5, 5, 5]);
    }

    #[test]
    fn host_is_required() {
        let err = Config::default().validate().unwrap_err();
        assert_eq!(field_of(err), "inverter.host");
        assert!(with_host().validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_source_keys() {
        let mut cfg = with_host();
        cfg.sources.push(cfg.sources[0].clone());
        assert_eq!(field_of(cfg.validate().unwrap_err()), "sources[5].key");
    }

    #[test]
    fn rejects_zero_dwell_and_empty_rotation() {
        let mut cfg = with_host();
        cfg.sources[2].dwell_secs = 0;
        assert_eq!(field_of(cfg.validate().unwrap_err()), "sources[2].dwell_secs");

        cfg.sources.clear();
        assert_eq!(field_of(cfg.validate().unwrap_err()), "sources");
    }

    #[test]
    fn rejects_out_of_range_display_settings() {
        let mut cfg = with_host();
        cfg.matrix.brightness = 16;
        assert_eq!(field_of(cfg.validate().unwrap_err()), "matrix.brightness");

        let mut cfg = with_host();
        cfg.matrix.rotate = 4;
        assert_eq!(field_of(cfg.validate().unwrap_err()), "matrix.rotate");

        let mut cfg = with_host();
        cfg.matrix.block_orientation = 45;
        assert_eq!(field_of(cfg.validate().unwrap_err()), "matrix.block_orientation");

        let mut cfg = with_host();
        cfg.segment.cascaded = 0;
        assert_eq!(field_of(cfg.validate().unwrap_err()), "segment.cascaded");
    }

    #[test]
    fn rejects_unparseable_night_window() {
        let mut cfg = with_host();
        cfg.schedule.night_end = "8am".into();
        assert_eq!(field_of(cfg.validate().unwrap_err()), "schedule.night_end");
    }

    #[test]
    fn translates_to_core_types() {
        let cfg = with_host();
        let seq = cfg.source_sequence().unwrap();
        assert_eq!(seq.len(), 5);
        assert_eq!(seq.at(0).display_name, "PV-in");
        assert_eq!(seq.at(0).alias_label, "P W");
        assert!(seq.at(0).is_remote);
        assert!(!seq.at(3).is_remote);

        let sched = cfg.scheduler_config().unwrap();
        assert_eq!(sched.brightness, BrightnessPolicy::default());
        assert_eq!(sched.matrix_brightness, Brightness::new(1));
        assert_eq!(sched.refresh_period, Duration::from_secs(1));
        assert_eq!(cfg.pause_duration(), Duration::from_secs(30));
    }

    #[test]
    fn file_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [inverter]
                host = "10.0.0.7"
                username = "admin"

                [schedule]
                night_start = "22:30"

                [[sources]]
                key = "battery_soc"
                name = "Batterie"
                alias = "B %"
                remote = true
                dwell_secs = 7
                "#,
            )?;
            jail.set_env("SUNTICKER_INVERTER__PORT", "8443");
            jail.set_env("SUNTICKER_INVERTER__SECURE", "true");
            jail.set_env(PASSWORD_ENV, "pw-from-env");

            let cfg = load_config(Some(Path::new("config.toml"))).unwrap();
            assert_eq!(cfg.inverter.host, "10.0.0.7");
            assert_eq!(cfg.inverter.port, 8443);
            assert!(cfg.inverter.secure);
            assert_eq!(cfg.schedule.night_start, "22:30");
            assert_eq!(cfg.schedule.night_end, "08:00");
            assert_eq!(cfg.sources.len(), 1);
            assert_eq!(cfg.sources[0].dwell_secs, 7);

            let client = cfg.client_config();
            assert_eq!(client.port, 8443);
            assert!(client.secure);
            let creds = client.credentials.unwrap();
            assert_eq!(creds.username, "admin");
            assert_eq!(creds.password.expose_secret(), "pw-from-env");
            Ok(())
        });
    }

    #[test]
    fn missing_file_uses_defaults_plus_env() {
        Jail::expect_with(|jail| {
            jail.set_env("SUNTICKER_INVERTER__HOST", "inverter.local");
            let cfg = load_config(Some(Path::new("absent.toml"))).unwrap();
            assert_eq!(cfg.inverter.host, "inverter.local");
            assert_eq!(cfg.sources.len(), 5);
            assert!(cfg.client_config().credentials.is_none());
            Ok(())
        });
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut cfg = with_host();
        cfg.schedule.pause_secs = 45;
        save_config(&cfg, &path).unwrap();

        let loaded: Config = Figment::new()
            .merge(Toml::file(&path))
            .extract()
            .unwrap();
        assert_eq!(loaded.inverter.host, "192.168.178.47");
        assert_eq!(loaded.schedule.pause_secs, 45);
        assert_eq!(loaded.sources, cfg.sources);
    }
}
