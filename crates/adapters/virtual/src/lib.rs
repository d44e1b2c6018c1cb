//! # thermo-adapter-virtual
//!
//! Virtual platform that stands in for a real home-automation hub, for
//! demonstration and end-to-end testing.
//!
//! ## Provided adapters
//!
//! | Adapter | Port | Behaviour |
//! |---------|------|-----------|
//! | [`VirtualPlatform`] | `StateStore` | Holds entity states in memory; `set_state` publishes a `StateChanged` |
//! | [`VirtualClimate`] | `Actuator` | Records climate commands and mirrors the hvac mode into the actor's entity |
//!
//! Failures can be scripted per actor on [`VirtualClimate`] to exercise the
//! retry policy.
//!
//! ## Dependency rule
//!
//! Depends on `thermo-app` (port traits) and `thermo-domain` only.

mod climate;
mod platform;

pub use climate::{ClimateCommand, VirtualClimate};
pub use platform::VirtualPlatform;
