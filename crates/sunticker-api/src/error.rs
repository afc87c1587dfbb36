use std::io;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Top-level error type for the `sunticker-api` crate.
///
/// Covers every failure mode of a telemetry session: socket setup,
/// request timeouts, session rejection by the device, and malformed
/// frames. `sunticker-core` classifies these into fault classes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket handshake or socket-level failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocket(#[source] Box<tungstenite::Error>),

    /// URL could not be built from host/port.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request/response exchange did not complete in time.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The device closed the socket (close frame or end of stream).
    #[error("WebSocket closed by device")]
    Closed,

    // ── Device ──────────────────────────────────────────────────────
    /// The device no longer accepts our token. Happens when another
    /// client opened a session and ours was dropped.
    #[error("Session rejected by device (code {code}): {message}")]
    SessionRejected { code: i64, message: String },

    /// Any other non-success `result_code`.
    #[error("Device error (code {code}): {message}")]
    Device { code: i64, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// Frame could not be decoded into the expected envelope.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Frame decoded but violates the protocol (missing token, wrong type).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<tungstenite::Error> for Error {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Self::Closed
            }
            other => Self::WebSocket(Box::new(other)),
        }
    }
}

impl Error {
    /// The underlying IO error kind, if this failure came from the socket.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::WebSocket(e) => match e.as_ref() {
                tungstenite::Error::Io(io) => Some(io.kind()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Returns `true` if the device dropped or refused our session.
    pub fn is_session_fault(&self) -> bool {
        matches!(self, Self::SessionRejected { .. } | Self::Closed)
    }

    /// Returns `true` if reconnecting has a chance of fixing this.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocket(_) | Self::Timeout { .. } | Self::Closed | Self::SessionRejected { .. }
        )
    }
}
