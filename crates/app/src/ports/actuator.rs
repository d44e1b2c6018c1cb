//! Actuator port — send commands to climate devices.

use std::future::Future;

use thermo_domain::actor::ActorTarget;
use thermo_domain::error::DeliveryError;
use thermo_domain::id::ActorId;

/// Carries out actor commands on the platform.
///
/// A single call is one attempt; retries and timeouts are handled by the
/// caller.
pub trait Actuator: Send + Sync {
    /// Drive `actor` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Rejected`] when the platform refuses or
    /// fails the command.
    fn send_command(
        &self,
        actor: &ActorId,
        target: &ActorTarget,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

impl<T: Actuator> Actuator for std::sync::Arc<T> {
    fn send_command(
        &self,
        actor: &ActorId,
        target: &ActorTarget,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        (**self).send_command(actor, target)
    }
}
