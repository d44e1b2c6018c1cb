//! Actor dispatcher — delivers targets to actuators with retries.
//!
//! Every actor of a room gets its own task. A task makes up to
//! `send_retries + 1` attempts spaced `send_retry_interval` apart; an attempt
//! that neither succeeds nor fails within the interval counts as a timeout.
//! Before each attempt the task compares the room's [`PassSequence`] with the
//! pass it was started for and stops quietly once a newer pass exists.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use thermo_domain::actor::{Actor, ActorTarget};
use thermo_domain::error::DeliveryError;
use thermo_domain::id::ActorId;
use tokio::task::JoinSet;
use tokio::time::{Instant, sleep_until, timeout};

use crate::ports::Actuator;

/// Monotonic pass counter shared between a room loop and its deliveries.
#[derive(Debug, Clone, Default)]
pub struct PassSequence(Arc<AtomicU64>);

impl PassSequence {
    #[must_use]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Start a new pass, superseding every delivery of older ones.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// How a delivery ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The actuator accepted the command.
    Delivered { attempts: u32 },
    /// A newer pass started before the command got through.
    Superseded { attempts: u32 },
}

/// Deliver `target` to `actor`, retrying per the actor's policy.
///
/// # Errors
///
/// Returns [`DeliveryError::RetriesExhausted`] wrapping the last failure
/// once every attempt has failed or timed out.
pub async fn deliver<A: Actuator + ?Sized>(
    actuator: &A,
    actor: &Actor,
    target: &ActorTarget,
    sequence: &PassSequence,
    pass: u64,
) -> Result<DeliveryOutcome, DeliveryError> {
    let interval = actor.send_retry_interval();
    let max_attempts = actor.send_retries().saturating_add(1);
    let mut attempt = 0;

    loop {
        if sequence.current() != pass {
            tracing::debug!(actor = %actor.id(), attempts = attempt, "delivery superseded");
            return Ok(DeliveryOutcome::Superseded { attempts: attempt });
        }
        attempt += 1;
        let started = Instant::now();

        let error = match timeout(interval, actuator.send_command(actor.id(), target)).await {
            Ok(Ok(())) => {
                tracing::debug!(actor = %actor.id(), %target, attempt, "command delivered");
                return Ok(DeliveryOutcome::Delivered { attempts: attempt });
            }
            Ok(Err(error)) => error,
            Err(_) => DeliveryError::Timeout {
                actor: actor.id().clone(),
                after: interval,
            },
        };

        if attempt >= max_attempts {
            return Err(DeliveryError::RetriesExhausted {
                actor: actor.id().clone(),
                attempts: attempt,
                last: Box::new(error),
            });
        }
        tracing::warn!(
            actor = %actor.id(),
            attempt,
            max_attempts,
            error = %error,
            "command failed, retrying"
        );
        sleep_until(started + interval).await;
    }
}

/// Result of one actor's delivery task.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorReport {
    pub actor: ActorId,
    pub target: ActorTarget,
    pub result: Result<DeliveryOutcome, DeliveryError>,
}

/// The delivery tasks started for one pass.
#[derive(Debug)]
pub struct Dispatch {
    pass: u64,
    tasks: JoinSet<ActorReport>,
}

impl Dispatch {
    /// Spawn one delivery task per actor.
    pub fn start<A>(
        actuator: &Arc<A>,
        commands: Vec<(Actor, ActorTarget)>,
        sequence: &PassSequence,
        pass: u64,
    ) -> Self
    where
        A: Actuator + 'static,
    {
        let mut tasks = JoinSet::new();
        for (actor, target) in commands {
            let actuator = Arc::clone(actuator);
            let sequence = sequence.clone();
            tasks.spawn(async move {
                let result = deliver(actuator.as_ref(), &actor, &target, &sequence, pass).await;
                ActorReport {
                    actor: actor.id().clone(),
                    target,
                    result,
                }
            });
        }
        Self { pass, tasks }
    }

    #[must_use]
    pub fn pass(&self) -> u64 {
        self.pass
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for the next actor to finish; `None` once all have.
    pub async fn next_report(&mut self) -> Option<ActorReport> {
        loop {
            match self.tasks.join_next().await? {
                Ok(report) => return Some(report),
                Err(error) => {
                    tracing::error!(pass = self.pass, error = %error, "delivery task failed");
                }
            }
        }
    }
}
