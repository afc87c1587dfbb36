// WebSocket session client
//
// One `Session` owns one open socket plus the token the device handed
// out for it. The device serves a single client at a time and silently
// invalidates older sessions when a new one connects, so every exchange
// is bounded by a timeout and every failure surfaces as a typed error
// for the caller to classify.

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{
    ConnectData, DeviceEntry, DeviceList, Envelope, LoginData, RESULT_OK, RESULT_TOKEN_INVALID,
    RealData, Snapshot,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SERVICE_PATH: &str = "/ws/home/overview";

/// Default plain-WebSocket port of the WiNet dongle.
pub const DEFAULT_PORT: u16 = 8082;

// ── Configuration ───────────────────────────────────────────────────

/// Optional account for firmware that requires the `login` service.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Everything needed to reach the device.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Locale such as `en_US`; sent lowercased as `lang`.
    pub locale: String,
    /// Upper bound for the handshake and for each request/response pair.
    pub timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            secure: false,
            locale: "en_US".into(),
            timeout: Duration::from_secs(5),
            credentials: None,
        }
    }

    /// Service URL, e.g. `ws://192.168.1.20:8082/ws/home/overview`.
    pub fn url(&self) -> Result<Url, Error> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let url = Url::parse(&format!(
            "{scheme}://{}:{}{SERVICE_PATH}",
            self.host, self.port
        ))?;
        Ok(url)
    }

    fn lang(&self) -> String {
        self.locale.to_ascii_lowercase()
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// Factory for telemetry sessions. Holds no socket itself.
#[derive(Debug, Clone)]
pub struct WinetClient {
    config: ClientConfig,
}

impl WinetClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Open a socket, obtain a token, log in if configured, and learn
    /// the device list.
    pub async fn connect(&self) -> Result<Session, Error> {
        let url = self.config.url()?;
        let timeout = self.config.timeout;
        debug!(url = %url, "connecting to inverter");

        let (stream, _response) =
            tokio::time::timeout(timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| timeout_error(timeout))??;

        let mut session = Session {
            stream,
            token: String::new(),
            lang: self.config.lang(),
            timeout,
            devices: Vec::new(),
        };

        let connect: ConnectData = session.call("connect", serde_json::Map::new()).await?;
        if connect.token.is_empty() {
            return Err(Error::Protocol("connect returned an empty token".into()));
        }
        session.token = connect.token;

        if let Some(ref creds) = self.config.credentials {
            let mut fields = serde_json::Map::new();
            fields.insert("username".into(), creds.username.clone().into());
            fields.insert("passwd".into(), creds.password.expose_secret().into());
            let login: LoginData = session.call("login", fields).await?;
            if let Some(token) = login.token.filter(|t| !t.is_empty()) {
                session.token = token;
            }
            debug!(username = %creds.username, "inverter login successful");
        }

        let mut fields = serde_json::Map::new();
        fields.insert("type".into(), "0".into());
        fields.insert("is_check_token".into(), "0".into());
        let list: DeviceList = session.call("devicelist", fields).await?;
        if list.list.is_empty() {
            return Err(Error::Protocol("device list is empty".into()));
        }
        session.devices = list.list;

        debug!(devices = session.devices.len(), "inverter session established");
        Ok(session)
    }
}

// ── Session ─────────────────────────────────────────────────────────

/// An authenticated, open telemetry session.
pub struct Session {
    stream: WsStream,
    token: String,
    lang: String,
    timeout: Duration,
    devices: Vec<DeviceEntry>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("lang", &self.lang)
            .field("devices", &self.devices)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn devices(&self) -> &[DeviceEntry] {
        &self.devices
    }

    /// Fetch every telemetry point of every device in one pass.
    ///
    /// `real_battery` is optional on most firmware: a plain device error
    /// there is ignored, a session fault is not.
    pub async fn snapshot(&mut self) -> Result<Snapshot, Error> {
        let mut snapshot = Snapshot::new();
        let devices = self.devices.clone();

        for device in &devices {
            let real: RealData = self.call("real", real_fields(device)).await?;
            snapshot.extend_raw(real.list);

            match self.call::<RealData>("real_battery", real_fields(device)).await {
                Ok(battery) => snapshot.extend_raw(battery.list),
                Err(Error::Device { code, message }) => {
                    trace!(code, %message, dev_id = %device.id(), "no battery data");
                }
                Err(e) => return Err(e),
            }
        }

        trace!(items = snapshot.len(), "snapshot fetched");
        Ok(snapshot)
    }

    /// Close the socket. Errors are irrelevant at this point.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }

    /// One request/response exchange, bounded by the session timeout.
    async fn call<T: DeserializeOwned>(
        &mut self,
        service: &str,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> Result<T, Error> {
        let mut body = serde_json::Map::new();
        body.insert("lang".into(), self.lang.clone().into());
        body.insert("token".into(), self.token.clone().into());
        body.insert("service".into(), service.into());
        body.extend(fields);
        let request = serde_json::Value::Object(body).to_string();

        let timeout = self.timeout;
        let text = tokio::time::timeout(timeout, self.exchange(request))
            .await
            .map_err(|_| timeout_error(timeout))??;

        decode_envelope(service, &text)
    }

    async fn exchange(&mut self, request: String) -> Result<String, Error> {
        self.stream.send(Message::text(request)).await?;

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Close(_))) | None => return Err(Error::Closed),
                Some(Ok(_)) => {
                    // Ping/Pong/Binary -- not part of the service protocol
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

fn real_fields(device: &DeviceEntry) -> serde_json::Map<String, serde_json::Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("dev_id".into(), device.id().into());
    fields.insert(
        "time123456".into(),
        chrono::Utc::now().timestamp_millis().into(),
    );
    fields
}

fn timeout_error(timeout: Duration) -> Error {
    Error::Timeout {
        timeout_secs: timeout.as_secs(),
    }
}

/// Unwrap the response envelope, mapping result codes to errors.
fn decode_envelope<T: DeserializeOwned>(service: &str, text: &str) -> Result<T, Error> {
    let envelope: Envelope = serde_json::from_str(text).map_err(|e| Error::Deserialization {
        message: format!("{service}: {e}"),
        body: text.to_owned(),
    })?;

    if envelope.result_code != RESULT_OK {
        let token_problem = envelope.result_code == RESULT_TOKEN_INVALID
            || envelope.result_msg.to_ascii_lowercase().contains("token");
        return Err(if token_problem {
            Error::SessionRejected {
                code: envelope.result_code,
                message: envelope.result_msg,
            }
        } else {
            Error::Device {
                code: envelope.result_code,
                message: envelope.result_msg,
            }
        });
    }

    serde_json::from_value(envelope.result_data).map_err(|e| Error::Deserialization {
        message: format!("{service}: {e}"),
        body: text.to_owned(),
    })
}
