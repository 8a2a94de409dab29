//! Lamp state machine and switch orchestration for the LCO
//! calibration lamps.
//!
//! This crate owns the timing-sensitive core between `lcolamps-driver`
//! (backend transports) and the CLI:
//!
//! - **[`Lamp`]** -- one per physical lamp: immutable identity and
//!   timing policy (minimum inter-switch interval, warm-up duration)
//!   plus the mutable state machine (`Off`/`Warming`/`On`/`Unknown`).
//!
//! - **[`LampSet`]** -- the configuration-ordered collection; resolves
//!   names (and the "all" sentinel) and groups lamps by backend for
//!   batched driver calls.
//!
//! - **[`SwitchController`]** -- the sole mutating entry point.
//!   [`switch()`](SwitchController::switch) enforces per-lamp timing,
//!   issues driver commands concurrently, holds for warm-up where
//!   required, and publishes exactly one aggregated state-update
//!   notification per request.
//!
//! All waits are cooperative (`tokio::time`); nothing here is fatal to
//! the process -- per-lamp failures are data in the [`SwitchResult`].

pub mod config;
pub mod error;
pub mod lamp;
pub mod set;
pub mod switch;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BackendKind, ControllerPolicy, LampConfig, TimingPolicy};
pub use error::CoreError;
pub use lamp::{Lamp, LampState};
pub use set::{LampSelector, LampSet};
pub use switch::{
    LampPower, LampsUpdate, SwitchController, SwitchFailure, SwitchOutcome, SwitchRequest,
    SwitchResult,
};
