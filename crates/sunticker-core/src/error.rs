// ── Core error types ──
//
// Only construction can fail in this crate. Runtime faults of providers
// and displays are logged and absorbed, never returned.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("rotation needs at least one source")]
    EmptyRotation,

    #[error("duplicate source key '{key}'")]
    DuplicateKey { key: String },

    #[error("source '{key}' has a dwell time of zero")]
    ZeroDwell { key: String },
}
