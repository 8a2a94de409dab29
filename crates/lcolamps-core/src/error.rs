// ── Core error types ──
//
// Structural errors only: a request that names a lamp that does not
// exist fails outright, before any side effect. Per-lamp operational
// failures (driver errors, timing rejections, timeouts) are never
// raised from `switch()` -- they are data in the `SwitchResult`.

use thiserror::Error;

use crate::config::BackendKind;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A requested lamp name is not configured. Raised before any
    /// driver command is issued.
    #[error("unknown lamp: {name}")]
    UnknownLamp { name: String },

    /// A configured lamp names a backend with no registered driver.
    #[error("no driver registered for the {kind} backend")]
    NoBackend { kind: BackendKind },

    /// Invalid lamp set construction (duplicate names, empty name).
    #[error("configuration error: {message}")]
    Config { message: String },
}
