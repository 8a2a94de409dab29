// ── Lamp state machine ──
//
// One `Lamp` per physical lamp. Legal transitions:
// Off -> Warming -> On, On/Warming -> Off, and Unknown -> anything
// (first command or reconcile resolves an unknown state).
//
// The accepted driver command and the timing gate are deliberately
// separate: `begin_transition` is called only after the backend
// accepted the command, so timing safety reasons purely from
// timestamps, independent of backend latency.

use std::sync::{Mutex, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use lcolamps_driver::{LampAddress, PowerReading};

use crate::config::{BackendKind, LampConfig};

/// Status of a lamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LampState {
    Off,
    Warming,
    On,
    /// Not yet reconciled against the backend (process start), or the
    /// backend reported an unparsable state.
    Unknown,
}

impl std::fmt::Display for LampState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Off => "OFF",
            Self::Warming => "WARMING",
            Self::On => "ON",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

/// Mutable per-lamp runtime data, guarded by one lock.
struct Runtime {
    state: LampState,
    last_transition: Option<Instant>,
    /// When the current warm-up completes. Tracks the *effective*
    /// warm-up, which a per-call override may shorten or stretch.
    warmup_deadline: Option<Instant>,
}

/// One of the connected lamps.
///
/// Identity, addressing, and timing policy are immutable; `state` and
/// `last_transition` are mutated only by the switch controller (and the
/// reconcile path). The `transition_lock` is the per-lamp exclusive
/// section: the controller holds it across the timing gate, the driver
/// command, and the transition bookkeeping, so concurrent requests
/// cannot interleave transitions of the same lamp. The warm-up hold is
/// outside it -- turning a warming lamp off must not wait.
pub struct Lamp {
    name: String,
    backend: BackendKind,
    address: LampAddress,
    min_switch_interval: Duration,
    warmup: Duration,

    runtime: RwLock<Runtime>,
    /// Held across one transition (gate, driver command, bookkeeping).
    pub(crate) transition_lock: tokio::sync::Mutex<()>,
    /// Detached watchdog that flips Warming -> On at the warm-up
    /// deadline even if the commanding request was cancelled.
    warmup_task: Mutex<Option<JoinHandle<()>>>,
}

impl Lamp {
    pub fn new(config: LampConfig) -> Self {
        Self {
            name: config.name,
            backend: config.backend,
            address: config.address,
            min_switch_interval: config.min_switch_interval,
            warmup: config.warmup,
            runtime: RwLock::new(Runtime {
                state: LampState::Unknown,
                last_transition: None,
                warmup_deadline: None,
            }),
            transition_lock: tokio::sync::Mutex::new(()),
            warmup_task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    pub fn address(&self) -> &LampAddress {
        &self.address
    }

    pub fn state(&self) -> LampState {
        self.read().state
    }

    /// Whether the lamp is already in (or heading to) the target state.
    ///
    /// A warming lamp counts as "on": commanding it on again is a
    /// no-op, the warm-up keeps running.
    pub fn is_in_target(&self, on: bool) -> bool {
        match self.read().state {
            LampState::On | LampState::Warming => on,
            LampState::Off => !on,
            LampState::Unknown => false,
        }
    }

    /// Whether a state-changing transition may begin now.
    ///
    /// True when the minimum inter-switch interval has elapsed since
    /// the last transition (no-ops are filtered out before this check
    /// and never wait).
    pub fn can_switch_now(&self, now: Instant) -> bool {
        self.interval_remaining(now).is_zero()
    }

    /// Time left until the minimum inter-switch interval has elapsed.
    pub fn interval_remaining(&self, now: Instant) -> Duration {
        match self.read().last_transition {
            Some(last) => (last + self.min_switch_interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Record an accepted driver command.
    ///
    /// Call only after the backend accepted the switch. Turning on with
    /// a nonzero warm-up enters `Warming` and arms the watchdog;
    /// otherwise the lamp lands directly in the target state. Turning
    /// off aborts any outstanding warm-up.
    pub fn begin_transition(
        self: &std::sync::Arc<Self>,
        on: bool,
        warmup_override: Option<Duration>,
        now: Instant,
    ) {
        let warmup = warmup_override.unwrap_or(self.warmup);
        let state = if on && !warmup.is_zero() {
            LampState::Warming
        } else if on {
            LampState::On
        } else {
            LampState::Off
        };

        {
            let mut runtime = self.write();
            runtime.state = state;
            runtime.last_transition = Some(now);
            runtime.warmup_deadline = (state == LampState::Warming).then(|| now + warmup);
        }
        debug!(lamp = %self.name, %state, "transition recorded");

        if state == LampState::Warming {
            self.arm_warmup_watchdog(warmup);
        } else {
            self.abort_warmup_watchdog();
        }
    }

    /// Remaining warm-up time; zero unless the lamp is `Warming`.
    pub fn warmup_remaining(&self, now: Instant) -> Duration {
        let runtime = self.read();
        if runtime.state != LampState::Warming {
            return Duration::ZERO;
        }
        match runtime.warmup_deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Flip `Warming` -> `On` once the warm-up has elapsed. Idempotent;
    /// does nothing while warm-up time remains.
    pub fn mark_ready(&self) {
        let mut runtime = self.write();
        if runtime.state != LampState::Warming {
            return;
        }
        let elapsed = runtime
            .warmup_deadline
            .is_none_or(|deadline| deadline.saturating_duration_since(Instant::now()).is_zero());
        if elapsed {
            runtime.state = LampState::On;
            runtime.warmup_deadline = None;
            debug!(lamp = %self.name, "warm-up complete");
        }
    }

    /// Reconcile the cached state against a backend reading.
    ///
    /// A warming lamp reads as physically on; the warm-up clock keeps
    /// running and is not clobbered. Reading `Off` cancels any warm-up
    /// (someone switched the lamp off behind our back).
    pub fn reconcile(&self, reading: PowerReading) {
        let mut runtime = self.write();
        match reading {
            PowerReading::On => {
                if runtime.state != LampState::Warming {
                    runtime.state = LampState::On;
                }
            }
            PowerReading::Off => {
                runtime.state = LampState::Off;
                runtime.warmup_deadline = None;
                drop(runtime);
                self.abort_warmup_watchdog();
            }
            PowerReading::Unknown => {
                if runtime.state != LampState::Warming {
                    runtime.state = LampState::Unknown;
                }
            }
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Runtime> {
        self.runtime.read().expect("lamp runtime lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Runtime> {
        self.runtime.write().expect("lamp runtime lock poisoned")
    }

    fn arm_warmup_watchdog(self: &std::sync::Arc<Self>, warmup: Duration) {
        let lamp = std::sync::Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(warmup).await;
            lamp.force_ready();
        });
        let previous = self
            .warmup_task
            .lock()
            .expect("warmup task lock poisoned")
            .replace(handle);
        if let Some(task) = previous {
            task.abort();
        }
    }

    fn abort_warmup_watchdog(&self) {
        if let Some(task) = self
            .warmup_task
            .lock()
            .expect("warmup task lock poisoned")
            .take()
        {
            task.abort();
        }
    }

    /// Watchdog path: the deadline has passed by construction, flip
    /// unconditionally if still warming.
    fn force_ready(&self) {
        let mut runtime = self.write();
        if runtime.state == LampState::Warming {
            runtime.state = LampState::On;
            runtime.warmup_deadline = None;
            debug!(lamp = %self.name, "warm-up complete (watchdog)");
        }
    }
}

impl std::fmt::Debug for Lamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lamp")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn lamp(interval: Duration, warmup: Duration) -> Arc<Lamp> {
        Arc::new(Lamp::new(LampConfig {
            name: "TCS".into(),
            backend: BackendKind::M2,
            address: LampAddress::M2 {
                m2_name: "TCS".into(),
                relay: 1,
            },
            min_switch_interval: interval,
            warmup,
        }))
    }

    #[tokio::test(start_paused = true)]
    async fn starts_unknown_and_switchable() {
        let lamp = lamp(Duration::from_secs(10), Duration::ZERO);
        assert_eq!(lamp.state(), LampState::Unknown);
        assert!(lamp.can_switch_now(Instant::now()));
        assert!(!lamp.is_in_target(true));
        assert!(!lamp.is_in_target(false));
    }

    #[tokio::test(start_paused = true)]
    async fn interval_gate_counts_from_last_transition() {
        let lamp = lamp(Duration::from_secs(10), Duration::ZERO);
        lamp.begin_transition(true, None, Instant::now());

        assert!(!lamp.can_switch_now(Instant::now()));
        assert_eq!(
            lamp.interval_remaining(Instant::now()),
            Duration::from_secs(10)
        );

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(lamp.can_switch_now(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_warmup_lands_directly_on() {
        let lamp = lamp(Duration::ZERO, Duration::ZERO);
        lamp.begin_transition(true, None, Instant::now());
        assert_eq!(lamp.state(), LampState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_holds_then_marks_ready() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(5));
        lamp.begin_transition(true, None, Instant::now());
        assert_eq!(lamp.state(), LampState::Warming);
        assert_eq!(
            lamp.warmup_remaining(Instant::now()),
            Duration::from_secs(5)
        );

        // Too early: mark_ready refuses.
        tokio::time::advance(Duration::from_secs(2)).await;
        lamp.mark_ready();
        assert_eq!(lamp.state(), LampState::Warming);

        tokio::time::advance(Duration::from_secs(3)).await;
        lamp.mark_ready();
        assert_eq!(lamp.state(), LampState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_completes_warmup_without_mark_ready() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(5));
        lamp.begin_transition(true, None, Instant::now());

        // Nobody calls mark_ready; the detached task finishes the job.
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(lamp.state(), LampState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn off_mid_warmup_goes_directly_off() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(60));
        lamp.begin_transition(true, None, Instant::now());
        assert_eq!(lamp.state(), LampState::Warming);

        lamp.begin_transition(false, None, Instant::now());
        assert_eq!(lamp.state(), LampState::Off);
        assert_eq!(lamp.warmup_remaining(Instant::now()), Duration::ZERO);

        // The aborted watchdog must not resurrect the lamp.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(lamp.state(), LampState::Off);
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_override_shortens_hold() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(60));
        lamp.begin_transition(true, Some(Duration::from_secs(2)), Instant::now());
        assert_eq!(lamp.state(), LampState::Warming);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(lamp.state(), LampState::On);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_maps_readings() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(5));

        lamp.reconcile(PowerReading::On);
        assert_eq!(lamp.state(), LampState::On);

        lamp.reconcile(PowerReading::Off);
        assert_eq!(lamp.state(), LampState::Off);

        lamp.reconcile(PowerReading::Unknown);
        assert_eq!(lamp.state(), LampState::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_on_keeps_warming() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(5));
        lamp.begin_transition(true, None, Instant::now());

        // The backend sees "on" while we are still warming up.
        lamp.reconcile(PowerReading::On);
        assert_eq!(lamp.state(), LampState::Warming);
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_off_cancels_warmup() {
        let lamp = lamp(Duration::ZERO, Duration::from_secs(5));
        lamp.begin_transition(true, None, Instant::now());

        lamp.reconcile(PowerReading::Off);
        assert_eq!(lamp.state(), LampState::Off);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(lamp.state(), LampState::Off);
    }
}
