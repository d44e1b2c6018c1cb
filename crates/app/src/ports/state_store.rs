//! State store port — read the platform's current entity states.

use std::future::Future;

use thermo_domain::id::EntityId;

/// Read access to the platform's entity states.
pub trait StateStore: Send + Sync {
    /// Current state text of `entity_id`, or `None` if the entity is unknown.
    fn get_state(&self, entity_id: &EntityId) -> impl Future<Output = Option<String>> + Send;
}

impl<T: StateStore> StateStore for std::sync::Arc<T> {
    fn get_state(&self, entity_id: &EntityId) -> impl Future<Output = Option<String>> + Send {
        (**self).get_state(entity_id)
    }
}
