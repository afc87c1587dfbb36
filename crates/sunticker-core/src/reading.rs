// ── Readings ──
//
// What a data provider hands back: a number, or a typed reason why
// there is none. Absence is an ordinary value, never an error that
// unwinds past the provider.

use std::fmt;
use std::io;

use strum::{AsRefStr, Display};
use thiserror::Error;

/// A numeric value in the provider's base unit (W, %, °C).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Measurement(f64);

impl Measurement {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Round to `decimals` places (used for sensor precision).
    pub fn rounded(self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        Self((self.0 * factor).round() / factor)
    }
}

impl From<f64> for Measurement {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

/// Integral values print without a fractional part (`5200`, not `5200.0`).
impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 && self.0.abs() < 1e15 {
            write!(f, "{:.0}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Broad cause of a communication failure with a networked provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum FaultClass {
    ConnectionRefused,
    HostUnreachable,
    Protocol,
    Timeout,
    /// The device dropped our session in favour of another client.
    SessionRejected,
    Closed,
    Unexpected,
}

impl FaultClass {
    fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::HostUnreachable
            }
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => Self::Closed,
            _ => Self::Unexpected,
        }
    }
}

impl From<&sunticker_api::Error> for FaultClass {
    fn from(err: &sunticker_api::Error) -> Self {
        use sunticker_api::Error as E;

        match err {
            E::WebSocket(_) => err.io_kind().map_or(Self::Protocol, Self::from_io),
            E::Timeout { .. } => Self::Timeout,
            E::Closed => Self::Closed,
            E::SessionRejected { .. } => Self::SessionRejected,
            E::Device { .. } | E::Deserialization { .. } | E::Protocol(_) => Self::Protocol,
            E::InvalidUrl(_) => Self::Unexpected,
        }
    }
}

/// Why a provider has no value right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Absence {
    /// Reconnect attempt failed; still disconnected.
    #[error("provider offline ({0})")]
    Offline(FaultClass),

    /// Connected call failed; the session was dropped.
    #[error("communication fault ({0})")]
    Fault(FaultClass),

    /// The key is not served by this provider (configuration fault).
    #[error("unknown item '{key}'")]
    UnknownKey { key: String },

    /// The backend reported something that is not a number (e.g. `--`).
    #[error("item '{key}' is not numeric: '{raw}'")]
    NotNumeric { key: String, raw: String },

    /// No sensor for this quantity answered at startup.
    #[error("sensor not present")]
    SensorAbsent,

    /// The sensor was present at startup but gave no valid value now.
    #[error("sensor read failed")]
    ReadFailed,
}

/// Result of asking a provider for one value.
pub type Reading = Result<Measurement, Absence>;
