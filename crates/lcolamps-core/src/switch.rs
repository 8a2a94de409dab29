// ── Switch controller ──
//
// Orchestrates one logical "set lamps to on/off" request across one or
// more lamps. Per-lamp flows run concurrently; each takes its lamp's
// exclusive section across the timing gate, the driver command, and
// the transition bookkeeping, so overlapping requests cannot
// interleave transitions of a shared lamp while unshared lamps proceed
// fully in parallel.
//
// Aggregation is the default code path: outcomes are collected for the
// whole request and exactly one state-update notification is published
// per `switch()` call, never one per lamp.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use lcolamps_driver::{DriverError, LampDriver};

use crate::config::{BackendKind, ControllerPolicy, TimingPolicy};
use crate::error::CoreError;
use crate::lamp::{Lamp, LampState};
use crate::set::{LampSelector, LampSet};

const UPDATE_CHANNEL_SIZE: usize = 64;

// ── Request / result types ──────────────────────────────────────────

/// Target power state of a switch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampPower {
    On,
    Off,
}

/// One logical caller-initiated switch command.
#[derive(Debug, Clone)]
pub struct SwitchRequest {
    pub targets: LampSelector,
    pub power: LampPower,
    /// Per-call warm-up override; `None` uses each lamp's configured
    /// warm-up. Ignored when turning off.
    pub warmup_override: Option<Duration>,
}

impl SwitchRequest {
    pub fn on(targets: LampSelector) -> Self {
        Self {
            targets,
            power: LampPower::On,
            warmup_override: None,
        }
    }

    pub fn off(targets: LampSelector) -> Self {
        Self {
            targets,
            power: LampPower::Off,
            warmup_override: None,
        }
    }

    pub fn with_warmup(mut self, warmup: Duration) -> Self {
        self.warmup_override = Some(warmup);
        self
    }
}

/// Why a lamp's switch failed. Data, not a propagated error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwitchFailure {
    /// The minimum inter-switch interval had not elapsed and the
    /// controller is configured to reject rather than wait.
    #[error("switched too recently, {} ms remaining", remaining.as_millis())]
    TooSoon { remaining: Duration },

    /// The backend command failed; the lamp's prior state is untouched.
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// The pre-commit deadline fired before the driver command was
    /// sent; nothing was touched.
    #[error("timed out before the backend accepted the command")]
    TimedOut,

    /// The lamp's backend has no registered driver.
    #[error("no driver for this lamp's backend")]
    NoBackend,
}

/// Per-lamp outcome of one switch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The backend accepted the command and the transition completed.
    Applied,
    /// The lamp was already in (or heading to) the target state;
    /// no driver command was issued.
    Skipped,
    Failed(SwitchFailure),
}

impl fmt::Display for SwitchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Skipped => write!(f, "skipped (already in state)"),
            Self::Failed(failure) => write!(f, "failed: {failure}"),
        }
    }
}

/// Result of one switch request: per-lamp outcomes plus a single
/// consistent snapshot of the whole set taken after the request
/// completed.
#[derive(Debug, Clone)]
pub struct SwitchResult {
    pub outcomes: IndexMap<String, SwitchOutcome>,
    pub states: IndexMap<String, LampState>,
}

impl SwitchResult {
    /// Whether every targeted lamp was applied or skipped.
    pub fn all_ok(&self) -> bool {
        !self
            .outcomes
            .values()
            .any(|o| matches!(o, SwitchOutcome::Failed(_)))
    }
}

/// The aggregated state-update notification, published exactly once
/// per `switch()` call.
#[derive(Debug, Clone)]
pub struct LampsUpdate {
    pub states: IndexMap<String, LampState>,
}

// ── Controller ──────────────────────────────────────────────────────

/// Orchestrates switch requests across the lamp set.
///
/// Sole owner of lamp mutations: nothing else calls
/// `begin_transition`/`mark_ready` once the controller is running.
pub struct SwitchController {
    set: LampSet,
    drivers: IndexMap<BackendKind, Arc<dyn LampDriver>>,
    policy: ControllerPolicy,
    update_tx: broadcast::Sender<LampsUpdate>,
}

impl SwitchController {
    pub fn new(set: LampSet, policy: ControllerPolicy) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        Self {
            set,
            drivers: IndexMap::new(),
            policy,
            update_tx,
        }
    }

    /// Register the driver for one backend kind.
    pub fn with_driver(mut self, kind: BackendKind, driver: Arc<dyn LampDriver>) -> Self {
        self.drivers.insert(kind, driver);
        self
    }

    /// Check that every configured lamp's backend has a driver.
    pub fn ensure_drivers(&self) -> Result<(), CoreError> {
        for lamp in self.set.iter() {
            if !self.drivers.contains_key(&lamp.backend()) {
                return Err(CoreError::NoBackend {
                    kind: lamp.backend(),
                });
            }
        }
        Ok(())
    }

    pub fn set(&self) -> &LampSet {
        &self.set
    }

    /// Read-only snapshot of every lamp's cached state. No side
    /// effects, safe to call anytime.
    pub fn status(&self) -> IndexMap<String, LampState> {
        self.set.status()
    }

    /// Subscribe to aggregated state-update notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<LampsUpdate> {
        self.update_tx.subscribe()
    }

    /// Reconcile cached lamp states against the backends.
    ///
    /// Queries each backend once (batched). A failed backend query
    /// leaves the affected lamps' cached states untouched and logs a
    /// warning -- callers still get a usable (if stale) status.
    pub async fn refresh(&self) {
        let all: Vec<Arc<Lamp>> = self.set.iter().map(Arc::clone).collect();
        for (kind, lamps) in LampSet::group_by_backend(&all) {
            let Some(driver) = self.drivers.get(&kind) else {
                warn!(backend = %kind, "no driver, skipping status refresh");
                continue;
            };
            let addresses: Vec<_> = lamps.iter().map(|l| l.address().clone()).collect();
            match driver.query(&addresses).await {
                Ok(readings) => {
                    for (lamp, reading) in lamps.iter().zip(readings) {
                        lamp.reconcile(reading);
                    }
                    debug!(backend = %kind, lamps = lamps.len(), "status refreshed");
                }
                Err(e) => {
                    warn!(backend = %kind, error = %e, "status refresh failed, keeping cached states");
                }
            }
        }
    }

    /// Execute one switch request. The sole mutating entry point.
    ///
    /// Structural failures (an unknown lamp name) error out before any
    /// side effect. Per-lamp operational failures are recorded in the
    /// result -- the call itself does not raise for them, so callers
    /// can inspect partial success.
    pub async fn switch(&self, request: SwitchRequest) -> Result<SwitchResult, CoreError> {
        let lamps = self.set.resolve(&request.targets)?;
        let on = request.power == LampPower::On;

        let flows = lamps
            .iter()
            .map(|lamp| self.switch_one(lamp, on, request.warmup_override));
        let outcomes_vec = join_all(flows).await;

        let outcomes: IndexMap<String, SwitchOutcome> = lamps
            .iter()
            .map(|lamp| lamp.name().to_string())
            .zip(outcomes_vec)
            .collect();
        let states = self.set.status();

        for (name, outcome) in &outcomes {
            info!(lamp = %name, %outcome, "switch outcome");
        }

        // One publish per request, after all outcomes are known.
        // Send only fails with zero subscribers, which is fine.
        let _ = self.update_tx.send(LampsUpdate {
            states: states.clone(),
        });

        Ok(SwitchResult { outcomes, states })
    }

    /// The per-lamp flow: exclusive section, idempotence check, timing
    /// gate, driver command, transition bookkeeping, warm-up hold.
    async fn switch_one(
        &self,
        lamp: &Arc<Lamp>,
        on: bool,
        warmup_override: Option<Duration>,
    ) -> SwitchOutcome {
        let _guard = lamp.transition_lock.lock().await;

        // Checked under the lock: a concurrent request may just have
        // moved the lamp. No driver command, no timer updates.
        if lamp.is_in_target(on) {
            return SwitchOutcome::Skipped;
        }

        if lamp.state() == LampState::Unknown {
            warn!(lamp = %lamp.name(), "state is unknown, commanding anyway");
        }

        let Some(driver) = self.drivers.get(&lamp.backend()) else {
            return SwitchOutcome::Failed(SwitchFailure::NoBackend);
        };

        // Pre-commit phase: timing gate plus the driver command. Only
        // this part is under the request deadline; once the backend
        // accepts, the lamp is committed and never rolled back.
        let precommit = async {
            let now = Instant::now();
            if !lamp.can_switch_now(now) {
                let remaining = lamp.interval_remaining(now);
                match self.policy.timing {
                    TimingPolicy::Reject => {
                        return Err(SwitchFailure::TooSoon { remaining });
                    }
                    TimingPolicy::Wait => {
                        debug!(
                            lamp = %lamp.name(),
                            wait_ms = remaining.as_millis(),
                            "waiting out the inter-switch interval"
                        );
                        sleep(remaining).await;
                    }
                }
            }
            driver
                .send(lamp.address(), on)
                .await
                .map_err(SwitchFailure::Driver)
        };

        let accepted = match self.policy.switch_timeout {
            Some(deadline) => match timeout(deadline, precommit).await {
                Ok(result) => result,
                Err(_) => Err(SwitchFailure::TimedOut),
            },
            None => precommit.await,
        };
        if let Err(failure) = accepted {
            return SwitchOutcome::Failed(failure);
        }

        lamp.begin_transition(on, warmup_override, Instant::now());

        // Release the exclusive section before the warm-up hold:
        // turning off never waits for warm-up, so an off request must
        // be able to take the lock while this lamp warms. `mark_ready`
        // checks the deadline, so a superseding transition wins.
        drop(_guard);

        // Turning on holds for the warm-up; turning off never waits.
        // The lamp's own watchdog covers us if this wait is cancelled.
        let remaining = lamp.warmup_remaining(Instant::now());
        if !remaining.is_zero() {
            sleep(remaining).await;
            lamp.mark_ready();
        }

        SwitchOutcome::Applied
    }
}

impl fmt::Debug for SwitchController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwitchController")
            .field("lamps", &self.set.len())
            .field("backends", &self.drivers.keys().collect::<Vec<_>>())
            .field("policy", &self.policy)
            .finish()
    }
}
