// ── Inverter data provider ──
//
// Lazily (re)connecting wrapper around a telemetry backend. The device
// serves one session at a time and drops ours whenever another client
// connects, so every call may find the session gone. Faults are
// classified, logged, and turned into absence; the next call reconnects.

use std::future::Future;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use sunticker_api::{Session, Snapshot, TelemetryItem, WinetClient};

use crate::provider::DataProvider;
use crate::reading::{Absence, FaultClass, Measurement, Reading};

/// Units reported in kilo that are scaled to base units.
const KILO_POWER_UNITS: [&str; 3] = ["kW", "kVA", "kvar"];

// ── Backend seam ─────────────────────────────────────────────────

/// Connection-oriented source of telemetry snapshots.
pub trait TelemetryBackend: Send + Sync + 'static {
    type Session: Send;

    fn connect(&self) -> impl Future<Output = Result<Self::Session, sunticker_api::Error>> + Send;

    fn snapshot<'a>(
        &'a self,
        session: &'a mut Self::Session,
    ) -> impl Future<Output = Result<Snapshot, sunticker_api::Error>> + Send + 'a;

    /// Dispose of a session that is no longer trusted.
    fn release(&self, session: Self::Session) -> impl Future<Output = ()> + Send;
}

impl TelemetryBackend for WinetClient {
    type Session = Session;

    fn connect(&self) -> impl Future<Output = Result<Session, sunticker_api::Error>> + Send {
        WinetClient::connect(self)
    }

    fn snapshot<'a>(
        &'a self,
        session: &'a mut Session,
    ) -> impl Future<Output = Result<Snapshot, sunticker_api::Error>> + Send + 'a {
        session.snapshot()
    }

    async fn release(&self, session: Session) {
        // A half-dead socket may never acknowledge the close frame.
        let _ = tokio::time::timeout(self.config().timeout, session.close()).await;
    }
}

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state of a remote provider. The handle never leaves it.
#[derive(Debug, Default)]
pub enum ConnectionState<S> {
    #[default]
    Disconnected,
    Connected(S),
}

impl<S> ConnectionState<S> {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

// ── InverterSource ───────────────────────────────────────────────

pub struct InverterSource<B: TelemetryBackend> {
    backend: B,
    state: Mutex<ConnectionState<B::Session>>,
}

impl<B: TelemetryBackend> InverterSource<B> {
    /// Starts disconnected; the first read connects.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    /// Fetch one item. Attempts exactly one reconnect if disconnected.
    pub async fn read(&self, key: &str) -> Reading {
        let mut state = self.state.lock().await;

        if !state.is_connected() {
            match self.backend.connect().await {
                Ok(session) => {
                    info!("inverter session established");
                    *state = ConnectionState::Connected(session);
                }
                Err(e) => {
                    let class = FaultClass::from(&e);
                    warn!(
                        key,
                        %class,
                        transient = e.is_transient(),
                        error = %e,
                        "inverter reconnect failed"
                    );
                    return Err(Absence::Offline(class));
                }
            }
        }

        let ConnectionState::Connected(session) = &mut *state else {
            return Err(Absence::Offline(FaultClass::Unexpected));
        };

        match self.backend.snapshot(session).await {
            Ok(snapshot) => extract(key, &snapshot),
            Err(e) => {
                let class = FaultClass::from(&e);
                warn!(
                    key,
                    %class,
                    session_fault = e.is_session_fault(),
                    error = %e,
                    "inverter communication fault, dropping session"
                );
                if let ConnectionState::Connected(stale) =
                    std::mem::replace(&mut *state, ConnectionState::Disconnected)
                {
                    self.backend.release(stale).await;
                }
                Err(Absence::Fault(class))
            }
        }
    }

    /// Drop the current session, if any.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        if let ConnectionState::Connected(session) =
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        {
            self.backend.release(session).await;
            debug!("inverter session closed");
        }
    }
}

impl<B: TelemetryBackend> DataProvider for InverterSource<B> {
    fn name(&self) -> &str {
        "inverter"
    }

    fn get_value<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Reading> {
        Box::pin(self.read(key))
    }
}

/// Look `key` up in a snapshot and normalize to base units.
fn extract(key: &str, snapshot: &Snapshot) -> Reading {
    let Some(item) = snapshot.get(key) else {
        warn!(key, "item is not provided by the inverter");
        return Err(Absence::UnknownKey { key: key.to_owned() });
    };
    normalize(key, item)
}

fn normalize(key: &str, item: &TelemetryItem) -> Reading {
    let raw = item.value.trim();
    // `f64` parsing accepts "NaN" and "inf", which no display can show.
    let Some(value) = raw.parse::<f64>().ok().filter(|v| v.is_finite()) else {
        debug!(key, raw, "non-numeric inverter value");
        return Err(Absence::NotNumeric {
            key: key.to_owned(),
            raw: raw.to_owned(),
        });
    };

    if KILO_POWER_UNITS.contains(&item.unit.as_str()) {
        Ok(Measurement::new(value * 1000.0).rounded(3))
    } else {
        Ok(Measurement::new(value))
    }
}
