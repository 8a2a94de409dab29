//! Backend transport layer for the LCO calibration lamps.
//!
//! Two hardware paths exist for switching a lamp:
//!
//! - **[`M2Client`]** -- raw TCP line protocol spoken by the M2 GUI
//!   server. One connection per command, single reply line, then
//!   disconnect (the M2 server only tolerates short-lived connections).
//! - **[`ActorClient`]** -- lamps owned by a third-party device actor,
//!   commanded through the actor hub with per-lamp command verbs.
//!
//! Both implement [`LampDriver`], the seam the switch controller in
//! `lcolamps-core` talks through. The controller never sees transport
//! details; it sees `send` succeed or fail with a [`DriverError`].

pub mod actor;
pub mod error;
pub mod m2;

use async_trait::async_trait;

pub use actor::ActorClient;
pub use error::DriverError;
pub use m2::M2Client;

// ── Addressing ──────────────────────────────────────────────────────

/// Backend-specific addressing for one lamp.
///
/// The switch controller carries these opaquely; only the matching
/// driver interprets them. An address handed to the wrong driver is a
/// caller bug and reported as [`DriverError::Rejected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LampAddress {
    /// Directly switched through the M2 controller.
    M2 {
        /// Name the M2 server uses for this lamp (may differ from the
        /// user-facing lamp name).
        m2_name: String,
        /// Relay number on the M2 lamp rack (1-based).
        relay: u8,
    },
    /// Delegated to another actor.
    Actor {
        /// Command string that turns the lamp on.
        on_verb: String,
        /// Command string that turns the lamp off.
        off_verb: String,
        /// Command string that reports the lamp state.
        status_verb: String,
    },
}

/// A power state as read back from a backend.
///
/// Distinct from the core's lamp state machine: a backend can only
/// report raw power, it knows nothing about warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerReading {
    Off,
    On,
    /// The backend replied but the value was unparsable, or the lamp
    /// was absent from the reply.
    Unknown,
}

// ── Driver seam ─────────────────────────────────────────────────────

/// A backend capable of switching and querying lamps.
///
/// Safe to call concurrently for different lamps on the same instance;
/// a single lamp's commands are serialized by the switch controller and
/// never race against themselves.
#[async_trait]
pub trait LampDriver: Send + Sync {
    /// Send one on/off command for one lamp.
    async fn send(&self, address: &LampAddress, on: bool) -> Result<(), DriverError>;

    /// Read back the power state of the given lamps in one batch.
    ///
    /// Returns one reading per input address, in input order. Lamps the
    /// backend does not report read as [`PowerReading::Unknown`].
    async fn query(&self, addresses: &[LampAddress]) -> Result<Vec<PowerReading>, DriverError>;
}
