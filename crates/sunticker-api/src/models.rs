// Wire types for the inverter's WebSocket service.
//
// Requests are flat JSON objects keyed by `service`; responses share the
// `{ result_code, result_msg, result_data }` envelope. Numeric fields
// arrive as strings or numbers depending on firmware, so identifiers are
// kept as `serde_json::Value` and stringified on use.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// `result_code` for a successful call.
pub const RESULT_OK: i64 = 1;

/// `result_code` the device returns when the token is unknown or expired.
pub const RESULT_TOKEN_INVALID: i64 = 106;

/// Response envelope shared by every service.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub result_code: i64,
    #[serde(default)]
    pub result_msg: String,
    #[serde(default)]
    pub result_data: serde_json::Value,
}

/// `result_data` of the `connect` service.
#[derive(Debug, Deserialize)]
pub struct ConnectData {
    pub token: String,
}

/// `result_data` of the `login` service.
#[derive(Debug, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub token: Option<String>,
}

/// `result_data` of the `devicelist` service.
#[derive(Debug, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub list: Vec<DeviceEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceEntry {
    pub dev_id: serde_json::Value,
    #[serde(default)]
    pub dev_type: serde_json::Value,
    #[serde(default)]
    pub dev_name: Option<String>,
}

impl DeviceEntry {
    /// Device id as the string form the `real` service expects.
    pub fn id(&self) -> String {
        json_to_plain(&self.dev_id)
    }

    pub fn kind(&self) -> String {
        json_to_plain(&self.dev_type)
    }
}

/// `result_data` of the `real` / `real_battery` services.
#[derive(Debug, Deserialize)]
pub struct RealData {
    #[serde(default)]
    pub list: Vec<RawItem>,
}

/// One telemetry point as the device sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawItem {
    pub data_name: String,
    #[serde(default)]
    pub data_value: serde_json::Value,
    #[serde(default)]
    pub data_unit: String,
}

/// A single telemetry value with its unit, as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryItem {
    pub value: String,
    pub unit: String,
}

/// All telemetry points fetched in one round trip, keyed by normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    items: HashMap<String, TelemetryItem>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&TelemetryItem> {
        self.items.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, item: TelemetryItem) {
        self.items.insert(key.into(), item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Merge raw device items, normalizing their names.
    pub fn extend_raw(&mut self, items: Vec<RawItem>) {
        for raw in items {
            let key = normalize_key(&raw.data_name);
            self.items.insert(
                key,
                TelemetryItem {
                    value: json_to_plain(&raw.data_value),
                    unit: raw.data_unit,
                },
            );
        }
    }
}

impl FromIterator<(String, TelemetryItem)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, TelemetryItem)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

const KEY_PREFIXES: [&str; 2] = ["I18N_COMMON_", "I18N_CONFIG_KEY_"];

/// Turn an i18n data name into the stable lowercase item key.
///
/// `I18N_COMMON_TOTAL_DCPOWER` becomes `total_dcpower`.
pub fn normalize_key(data_name: &str) -> String {
    let stripped = KEY_PREFIXES
        .iter()
        .find_map(|p| data_name.strip_prefix(p))
        .unwrap_or(data_name);
    stripped.to_ascii_lowercase()
}

fn json_to_plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
