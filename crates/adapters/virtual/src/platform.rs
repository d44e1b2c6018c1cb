//! Virtual platform — in-memory entity states.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use thermo_app::ports::{Clock, EventPublisher, StateStore};
use thermo_domain::event::StateChanged;
use thermo_domain::id::EntityId;

/// In-memory entity states that publish a [`StateChanged`] on every write.
pub struct VirtualPlatform<P, C> {
    states: RwLock<HashMap<EntityId, String>>,
    publisher: P,
    clock: C,
}

impl<P, C> VirtualPlatform<P, C>
where
    P: EventPublisher + Send + Sync,
    C: Clock,
{
    #[must_use]
    pub fn new(publisher: P, clock: C) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            publisher,
            clock,
        }
    }

    /// Seed initial states without publishing anything.
    #[must_use]
    pub fn with_states<I, S>(self, states: I) -> Self
    where
        I: IntoIterator<Item = (EntityId, S)>,
        S: Into<String>,
    {
        {
            let mut map = self.states.write().unwrap_or_else(PoisonError::into_inner);
            map.extend(states.into_iter().map(|(id, state)| (id, state.into())));
        }
        self
    }

    /// Set the state of `entity_id` and publish the change.
    pub async fn set_state(&self, entity_id: &EntityId, state: impl Into<String>) -> StateChanged {
        let state = state.into();
        let old_state = self
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity_id.clone(), state.clone());
        self.emit(entity_id, old_state, Some(state)).await
    }

    /// Drop `entity_id`, making it unavailable, and publish the change.
    pub async fn remove(&self, entity_id: &EntityId) -> StateChanged {
        let old_state = self
            .states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id);
        self.emit(entity_id, old_state, None).await
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn emit(
        &self,
        entity_id: &EntityId,
        old_state: Option<String>,
        new_state: Option<String>,
    ) -> StateChanged {
        let event = StateChanged {
            entity_id: entity_id.clone(),
            old_state,
            new_state,
            changed_at: self.clock.now(),
        };
        tracing::debug!(%event, "virtual state changed");
        self.publisher.publish(event.clone()).await;
        event
    }
}

impl<P, C> StateStore for VirtualPlatform<P, C>
where
    P: Send + Sync,
    C: Send + Sync,
{
    fn get_state(&self, entity_id: &EntityId) -> impl Future<Output = Option<String>> + Send {
        let state = self
            .states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned();
        async { state }
    }
}
