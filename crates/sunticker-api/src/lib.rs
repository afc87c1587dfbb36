//! Async client for the local WebSocket telemetry service of WiNet-equipped
//! solar inverters.
//!
//! - **[`WinetClient`]** builds sessions from a [`ClientConfig`].
//! - **[`Session`]** owns one open socket and its device token;
//!   [`Session::snapshot()`] fetches every telemetry point in one pass.
//! - **[`Snapshot`]** maps normalized item keys (`total_dcpower`,
//!   `battery_soc`, ...) to value/unit pairs as reported by the device.
//!
//! The device accepts one session at a time and drops older ones without
//! notice. Callers are expected to treat any [`Error`] as "session gone"
//! and reconnect lazily.

pub mod client;
pub mod error;
pub mod models;

pub use client::{ClientConfig, Credentials, DEFAULT_PORT, Session, WinetClient};
pub use error::Error;
pub use models::{Snapshot, TelemetryItem, normalize_key};

/// Socket-level error type wrapped by [`Error::WebSocket`].
pub use tokio_tungstenite::tungstenite::Error as WsError;
