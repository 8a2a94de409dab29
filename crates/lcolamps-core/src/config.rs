// ── Runtime configuration types ──
//
// These describe the lamp inventory and controller policy at runtime.
// The CLI (via `lcolamps-config`) constructs them and hands them in;
// the core never reads config files.

use std::fmt;
use std::time::Duration;

use lcolamps_driver::LampAddress;

/// Which hardware path commands a lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Directly addressed through the M2 controller.
    M2,
    /// Delegated to a third-party device actor.
    Actor,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::M2 => write!(f, "M2"),
            Self::Actor => write!(f, "actor"),
        }
    }
}

/// What to do when a lamp is commanded before its minimum inter-switch
/// interval has elapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimingPolicy {
    /// Sleep until the interval has elapsed, then proceed.
    #[default]
    Wait,
    /// Record a per-lamp `TooSoon` failure without touching the driver.
    Reject,
}

/// Static per-lamp configuration.
#[derive(Debug, Clone)]
pub struct LampConfig {
    /// User-facing lamp name (unique, case-insensitive).
    pub name: String,
    pub backend: BackendKind,
    pub address: LampAddress,
    /// Minimum duration between two state-changing transitions.
    pub min_switch_interval: Duration,
    /// Hold time after power-on before the lamp is usable.
    pub warmup: Duration,
}

/// Controller-wide policy.
#[derive(Debug, Clone, Default)]
pub struct ControllerPolicy {
    pub timing: TimingPolicy,
    /// Per-lamp deadline for the pre-commit phase (interval wait plus
    /// driver command). `None` means no deadline.
    pub switch_timeout: Option<Duration>,
}
