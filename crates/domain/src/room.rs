//! Room — the unit of scheduling.
//!
//! A room owns a [`Schedule`] and the [`Actor`]s it drives. Rooms are built
//! once from their [`RoomDef`] and never change afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::actor::{Actor, ActorDef};
use crate::error::ConfigError;
use crate::expr::{Environment, StateLookup};
use crate::id::{ActorId, EntityId, RoomId};
use crate::resolver::{Resolution, resolve};
use crate::rule::{RuleDef, Schedule, build_schedule};

/// A compiled, ready-to-run room.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    rescheduling_delay: Duration,
    grace_period: Duration,
    actors: Vec<Actor>,
    schedule: Schedule,
    env: Arc<Environment>,
    enabled_entity: Option<EntityId>,
    referenced: BTreeSet<EntityId>,
    watched: BTreeSet<EntityId>,
}

impl Room {
    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// How long entity changes are collected before a pass runs.
    #[must_use]
    pub fn rescheduling_delay(&self) -> Duration {
        self.rescheduling_delay
    }

    /// Minimum time between a send and a non-overlay change.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    #[must_use]
    pub fn actors(&self) -> &[Actor] {
        &self.actors
    }

    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Entity whose state must be `on` for the room to be scheduled.
    #[must_use]
    pub fn enabled_entity(&self) -> Option<&EntityId> {
        self.enabled_entity.as_ref()
    }

    /// Entities the schedule's expressions can read.
    #[must_use]
    pub fn referenced_entities(&self) -> &BTreeSet<EntityId> {
        &self.referenced
    }

    /// Entities whose changes trigger a pass.
    #[must_use]
    pub fn watched_entities(&self) -> &BTreeSet<EntityId> {
        &self.watched
    }

    #[must_use]
    pub fn is_watching(&self, entity_id: &EntityId) -> bool {
        self.watched.contains(entity_id)
    }

    /// Resolve the schedule against a snapshot.
    #[must_use]
    pub fn resolve<S: StateLookup + ?Sized>(&self, state: &S) -> Resolution {
        resolve(&self.schedule, &self.env, state)
    }
}

/// A room as written in configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoomDef {
    /// Seconds to collect entity changes before a pass.
    #[serde(default)]
    pub rescheduling_delay: u64,
    /// Seconds after a send during which non-overlay changes wait.
    #[serde(default)]
    pub grace_period: u64,
    #[serde(default)]
    pub watched_entities: Vec<EntityId>,
    #[serde(default)]
    pub enabled_entity: Option<EntityId>,
    #[serde(default)]
    pub actors: BTreeMap<ActorId, ActorDef>,
    #[serde(default)]
    pub schedule: Vec<RuleDef>,
}

impl RoomDef {
    /// Compile into a [`Room`], checking every actor and rule.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoActors`] for a room without actors, or the
    /// first error found in an actor or the schedule.
    pub fn build(&self, id: RoomId, env: Arc<Environment>) -> Result<Room, ConfigError> {
        if self.actors.is_empty() {
            return Err(ConfigError::NoActors);
        }
        let actors = self
            .actors
            .iter()
            .map(|(actor_id, def)| def.build(actor_id.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        let schedule = build_schedule(&self.schedule, &env)?;

        let referenced: BTreeSet<EntityId> = schedule
            .expressions()
            .into_iter()
            .flat_map(|expr| env.referenced_entities(expr.ast()))
            .collect();

        let mut watched: BTreeSet<EntityId> = self.watched_entities.iter().cloned().collect();
        watched.extend(actors.iter().map(|actor| EntityId::from(actor.id().clone())));
        watched.extend(self.enabled_entity.iter().cloned());
        watched.extend(referenced.iter().cloned());

        Ok(Room {
            id,
            rescheduling_delay: Duration::from_secs(self.rescheduling_delay),
            grace_period: Duration::from_secs(self.grace_period),
            actors,
            schedule,
            env,
            enabled_entity: self.enabled_entity.clone(),
            referenced,
            watched,
        })
    }
}
