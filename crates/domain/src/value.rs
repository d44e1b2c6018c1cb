//! Value — the resolved target of a room.
//!
//! A value is a single setpoint, an operable range or "off", plus the
//! overlay flag that marks values produced by `Mark(value, OVERLAY)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What the room should be driven to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Setpoint {
    /// A single target temperature.
    Temperature { value: f64 },
    /// An operable range; the actuator keeps the room within `min..=max`.
    Range { min: f64, max: f64 },
    /// The actuator is switched off.
    Off,
}

impl Setpoint {
    /// Whether this setpoint implies the actuator is running.
    #[must_use]
    pub fn is_on(&self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl fmt::Display for Setpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature { value } => write!(f, "{value}"),
            Self::Range { min, max } => write!(f, "[{min}, {max}]"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// A resolved setpoint together with its overlay flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    pub setpoint: Setpoint,
    /// Set only for values produced by `Mark(value, OVERLAY)`.
    #[serde(default)]
    pub is_overlay: bool,
}

impl Value {
    /// A single target temperature.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when `value` is not finite.
    pub fn temperature(value: f64) -> Result<Self, ConfigError> {
        if !value.is_finite() {
            return Err(ConfigError::InvalidValue {
                reason: "temperature must be finite",
            });
        }
        Ok(Self::from(Setpoint::Temperature { value }))
    }

    /// An operable range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a bound is not finite or
    /// `min > max`.
    pub fn range(min: f64, max: f64) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() {
            return Err(ConfigError::InvalidValue {
                reason: "range bounds must be finite",
            });
        }
        if min > max {
            return Err(ConfigError::InvalidValue {
                reason: "range minimum must not exceed maximum",
            });
        }
        Ok(Self::from(Setpoint::Range { min, max }))
    }

    /// The distinguished "off" value.
    #[must_use]
    pub fn off() -> Self {
        Self::from(Setpoint::Off)
    }

    /// The same setpoint flagged as an overlay.
    #[must_use]
    pub fn into_overlay(self) -> Self {
        Self {
            is_overlay: true,
            ..self
        }
    }

    /// Whether two values drive the actuator to the same place, ignoring
    /// the overlay flag.
    #[must_use]
    pub fn same_setpoint(&self, other: &Self) -> bool {
        self.setpoint == other.setpoint
    }
}

impl From<Setpoint> for Value {
    fn from(setpoint: Setpoint) -> Self {
        Self {
            setpoint,
            is_overlay: false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_overlay {
            write!(f, "{} (overlay)", self.setpoint)
        } else {
            self.setpoint.fmt(f)
        }
    }
}
