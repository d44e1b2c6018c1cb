//! # thermo-domain
//!
//! Pure domain model for the thermo climate scheduler.
//!
//! ## Responsibilities
//! - Foundational types: identifiers, error taxonomy, wall-clock helpers
//! - Define **Values** (setpoint, range, off) and their overlay marker
//! - Define **Time windows** with weekday sets and midnight wraparound
//! - Define the **expression language** used by control rules and the helper
//!   environment (lexer, parser, evaluator)
//! - Define **Rules** and **Schedules**, and the resolver that walks them
//! - Define **Rooms** and **Actors**, including per-actor target computation
//! - Define the **state change event** carried by the event bus
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! State is read through the [`expr::StateLookup`] trait; the `app` crate
//! decides where the values come from.

pub mod error;
pub mod id;
pub mod time;

pub mod actor;
pub mod event;
pub mod expr;
pub mod resolver;
pub mod room;
pub mod rule;
pub mod value;
pub mod window;
