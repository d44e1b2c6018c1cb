//! Reconciliation timing — when to run a pass and whether to send its value.
//!
//! Pure bookkeeping over tokio [`Instant`]s; the room loop owns one
//! [`Reconciler`] and asks it after every trigger and every pass.

use std::time::Duration;

use thermo_domain::value::Value;
use tokio::time::Instant;

/// What to do with a freshly resolved value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Dispatch it to the actors.
    Send,
    /// It matches what was last dispatched.
    Unchanged,
    /// It differs, but the last send is too recent; re-check at `until`.
    Suppressed { until: Instant },
}

/// Debounce and grace-period state of one room.
#[derive(Debug, Clone)]
pub struct Reconciler {
    rescheduling_delay: Duration,
    grace_period: Duration,
    /// Deferred pass armed by entity changes.
    deferred: Option<Instant>,
    /// Re-check after a suppressed change.
    recheck: Option<Instant>,
    /// Value last dispatched; cleared when a delivery fails.
    target: Option<Value>,
    last_sent: Option<Instant>,
}

impl Reconciler {
    #[must_use]
    pub fn new(rescheduling_delay: Duration, grace_period: Duration) -> Self {
        Self {
            rescheduling_delay,
            grace_period,
            deferred: None,
            recheck: None,
            target: None,
            last_sent: None,
        }
    }

    /// Record an entity change. The first change arms a deferred pass
    /// `rescheduling_delay` later; further changes join it.
    pub fn entity_changed(&mut self, now: Instant) {
        if self.deferred.is_none() {
            self.deferred = Some(now + self.rescheduling_delay);
        }
    }

    /// Earliest armed timer, if any.
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Instant> {
        match (self.deferred, self.recheck) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Whether an armed timer is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_wakeup().is_some_and(|at| at <= now)
    }

    /// A pass is starting; it covers every pending trigger.
    pub fn pass_started(&mut self) {
        self.deferred = None;
        self.recheck = None;
    }

    /// Decide whether `value` should be dispatched. `force` skips every check.
    pub fn decide(&mut self, value: &Value, now: Instant, force: bool) -> Decision {
        if force {
            return Decision::Send;
        }
        if self.target.is_some_and(|target| target.same_setpoint(value)) {
            return Decision::Unchanged;
        }
        if !value.is_overlay
            && let Some(sent) = self.last_sent
        {
            let until = sent + self.grace_period;
            if now < until {
                self.recheck = Some(until);
                return Decision::Suppressed { until };
            }
        }
        Decision::Send
    }

    /// `value` is now being dispatched.
    pub fn dispatch_started(&mut self, value: Value) {
        self.target = Some(value);
    }

    /// An actor accepted a command.
    pub fn delivered(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }

    /// An actor gave up; the next pass sends again whatever it resolves.
    pub fn delivery_failed(&mut self) {
        self.target = None;
    }

    /// An actor reports a state other than the dispatched target, e.g. after
    /// a manual change. The next decision treats the value as new, still
    /// subject to the grace period.
    pub fn actor_drifted(&mut self) {
        self.target = None;
    }

    #[must_use]
    pub fn target(&self) -> Option<&Value> {
        self.target.as_ref()
    }
}
