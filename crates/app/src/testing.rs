//! In-memory port implementations shared by the unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use thermo_domain::actor::ActorTarget;
use thermo_domain::error::DeliveryError;
use thermo_domain::id::{ActorId, EntityId};
use thermo_domain::time::LocalTime;
use tokio::time::Instant;

use crate::ports::{Actuator, StateStore};

/// Monday 2026-01-05, 10:00.
pub(crate) fn monday_morning() -> LocalTime {
    NaiveDate::from_ymd_opt(2026, 1, 5)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    states: Mutex<HashMap<EntityId, String>>,
}

impl MemoryStore {
    pub(crate) fn set(&self, entity_id: &str, state: &str) {
        self.states
            .lock()
            .unwrap()
            .insert(EntityId::new(entity_id), state.to_string());
    }
}

impl StateStore for MemoryStore {
    fn get_state(&self, entity_id: &EntityId) -> impl Future<Output = Option<String>> + Send {
        let state = self.states.lock().unwrap().get(entity_id).cloned();
        async { state }
    }
}

/// Records every attempt; rejects them while `failing` is set.
#[derive(Default)]
pub(crate) struct RecordingActuator {
    pub(crate) failing: AtomicBool,
    attempts: Mutex<Vec<(Instant, ActorId, String)>>,
}

impl RecordingActuator {
    pub(crate) fn attempts(&self) -> Vec<(Instant, ActorId, String)> {
        self.attempts.lock().unwrap().clone()
    }
}

impl Actuator for RecordingActuator {
    fn send_command(
        &self,
        actor: &ActorId,
        target: &ActorTarget,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        self.attempts
            .lock()
            .unwrap()
            .push((Instant::now(), actor.clone(), target.to_string()));
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(DeliveryError::Rejected {
                actor: actor.clone(),
                reason: "unavailable".to_string(),
            })
        } else {
            Ok(())
        };
        async { result }
    }
}
