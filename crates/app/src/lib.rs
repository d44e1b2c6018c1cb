//! # thermo-app
//!
//! Application layer — room scheduling and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `StateStore` — read the current state text of an entity
//!   - `Actuator` — send a target to a climate actor
//!   - `EventPublisher` — publish entity state changes
//!   - `Clock` — local wall-clock time
//! - Run one **room loop** per room: debounce, resolve, reconcile, dispatch
//! - Route state-change events to the rooms that watch them (`Scheduler`)
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `thermo-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod dispatcher;
pub mod event_bus;
pub mod ports;
pub mod reconcile;
pub mod room_loop;
pub mod scheduler;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;
