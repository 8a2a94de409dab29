// ── Driver error types ──
//
// Transport-layer errors scoped to a single backend command. The core
// never aborts a multi-lamp request on one of these -- they are
// recorded as per-lamp outcomes.

use thiserror::Error;

/// An error from one backend command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// Transport failure -- connection refused, reset, short read.
    /// Retryable by the caller.
    #[error("communication error: {message}")]
    Communication { message: String },

    /// The hardware understood the command and refused it (or the
    /// reply contradicted the commanded state). Not retryable.
    #[error("command rejected: {message}")]
    Rejected { message: String },

    /// No reply within the transport deadline.
    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
}
