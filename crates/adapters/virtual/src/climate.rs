//! Virtual climate actuator — records commands instead of driving hardware.
//!
//! An accepted command sets the actor's entity state to the commanded hvac
//! mode, the way a real thermostat reports back after a change.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thermo_app::ports::{Actuator, Clock, EventPublisher};
use thermo_domain::actor::ActorTarget;
use thermo_domain::error::DeliveryError;
use thermo_domain::id::{ActorId, EntityId};

use crate::platform::VirtualPlatform;

/// A command accepted by [`VirtualClimate`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateCommand {
    pub actor: ActorId,
    pub target: ActorTarget,
    /// The target rendered as climate service data.
    pub service_data: serde_json::Value,
}

enum Response {
    Accept,
    Reject,
    Hang,
}

/// Simulated climate devices on a [`VirtualPlatform`].
pub struct VirtualClimate<P, C> {
    platform: Arc<VirtualPlatform<P, C>>,
    commands: Mutex<Vec<ClimateCommand>>,
    failures: Mutex<HashMap<ActorId, u32>>,
    offline: Mutex<HashSet<ActorId>>,
}

impl<P, C> VirtualClimate<P, C> {
    #[must_use]
    pub fn new(platform: Arc<VirtualPlatform<P, C>>) -> Self {
        Self {
            platform,
            commands: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            offline: Mutex::new(HashSet::new()),
        }
    }

    /// Reject the next `times` commands sent to `actor`.
    pub fn fail_next(&self, actor: &ActorId, times: u32) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actor.clone(), times);
    }

    /// An offline actor never answers, so every attempt times out.
    pub fn set_offline(&self, actor: &ActorId, offline: bool) {
        let mut set = self.offline.lock().unwrap_or_else(PoisonError::into_inner);
        if offline {
            set.insert(actor.clone());
        } else {
            set.remove(actor);
        }
    }

    /// Commands accepted so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> Vec<ClimateCommand> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn respond(&self, actor: &ActorId, target: &ActorTarget) -> Response {
        if self
            .offline
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(actor)
        {
            return Response::Hang;
        }
        {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(remaining) = failures.get_mut(actor)
                && *remaining > 0
            {
                *remaining -= 1;
                return Response::Reject;
            }
        }

        let command = ClimateCommand {
            actor: actor.clone(),
            target: target.clone(),
            service_data: target.service_data(),
        };
        tracing::info!(
            actor = %actor,
            data = %command.service_data,
            "virtual climate command"
        );
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        Response::Accept
    }
}

impl<P, C> Actuator for VirtualClimate<P, C>
where
    P: EventPublisher + Send + Sync + 'static,
    C: Clock + 'static,
{
    fn send_command(
        &self,
        actor: &ActorId,
        target: &ActorTarget,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        let response = self.respond(actor, target);
        let platform = Arc::clone(&self.platform);
        let actor = actor.clone();
        let hvac_mode = target.hvac_mode.clone();

        async move {
            match response {
                Response::Accept => {
                    platform
                        .set_state(&EntityId::from(actor), hvac_mode)
                        .await;
                    Ok(())
                }
                Response::Reject => Err(DeliveryError::Rejected {
                    actor,
                    reason: "simulated failure".to_string(),
                }),
                Response::Hang => std::future::pending().await,
            }
        }
    }
}
