//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text, plus the exit codes the process terminates with.

use miette::Diagnostic;
use thiserror::Error;

use lcolamps_config::ConfigError;
use lcolamps_core::CoreError;

/// Exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const SWITCH_FAILED: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("lamp '{name}' is not configured")]
    #[diagnostic(
        code(lcolamps::unknown_lamp),
        help("Run: lcolamps status to see the configured lamps")
    )]
    UnknownLamp { name: String },

    #[error("no backend configured for {kind} lamps")]
    #[diagnostic(
        code(lcolamps::no_backend),
        help("Add the matching [m2] or [actor] section to the configuration file.")
    )]
    NoBackend { kind: String },

    #[error("{failed} of {total} lamps failed to switch")]
    #[diagnostic(
        code(lcolamps::switch_failed),
        help("The per-lamp outcomes above show which lamps failed and why.")
    )]
    SwitchFailed { failed: usize, total: usize },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lcolamps::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration error")]
    #[diagnostic(
        code(lcolamps::config),
        help("Expected a configuration file at {path}, or pass --config.")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownLamp { .. } => exit_code::NOT_FOUND,
            Self::SwitchFailed { .. } => exit_code::SWITCH_FAILED,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownLamp { name } => Self::UnknownLamp { name },
            CoreError::NoBackend { kind } => Self::NoBackend {
                kind: kind.to_string(),
            },
            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}
