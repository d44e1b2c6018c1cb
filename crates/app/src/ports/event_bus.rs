//! Event bus port — publish state changes to interested subscribers.

use std::future::Future;

use thermo_domain::event::StateChanged;

/// Publishes state change events to all current subscribers.
pub trait EventPublisher {
    /// Publish an event. Events published while nobody listens are dropped.
    fn publish(&self, event: StateChanged) -> impl Future<Output = ()> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: StateChanged) -> impl Future<Output = ()> + Send {
        (**self).publish(event)
    }
}
