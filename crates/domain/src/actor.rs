//! Actor — one climate device driven by a room.
//!
//! An actor turns the room's resolved [`Value`] into an [`ActorTarget`]:
//! an operating mode plus the setpoint shifted by the actor's delta and
//! clamped to its limits.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::id::ActorId;
use crate::value::{Setpoint, Value};

/// Mode sent when the value is "off".
pub const MODE_OFF: &str = "off";

/// A configured climate device.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    id: ActorId,
    hvac_mode_on: String,
    send_retries: u32,
    send_retry_interval: Duration,
    delta: [f64; 2],
    min_temp: Option<f64>,
    max_temp: Option<f64>,
}

impl Actor {
    #[must_use]
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Mode used whenever the value is not "off".
    #[must_use]
    pub fn hvac_mode_on(&self) -> &str {
        &self.hvac_mode_on
    }

    /// Additional attempts after the first one fails.
    #[must_use]
    pub fn send_retries(&self) -> u32 {
        self.send_retries
    }

    /// Spacing between attempts, also the timeout of a single attempt.
    #[must_use]
    pub fn send_retry_interval(&self) -> Duration {
        self.send_retry_interval
    }

    /// What this actor should be set to for `value`.
    #[must_use]
    pub fn target_for(&self, value: &Value) -> ActorTarget {
        let [low, high] = self.delta;
        let setpoint = match value.setpoint {
            Setpoint::Off => {
                return ActorTarget {
                    hvac_mode: MODE_OFF.to_string(),
                    setpoint: None,
                };
            }
            Setpoint::Temperature { value } => Setpoint::Temperature {
                value: self.clamp(value + low),
            },
            Setpoint::Range { min, max } => Setpoint::Range {
                min: self.clamp(min + low),
                max: self.clamp(max + high),
            },
        };
        ActorTarget {
            hvac_mode: self.hvac_mode_on.clone(),
            setpoint: Some(setpoint),
        }
    }

    fn clamp(&self, value: f64) -> f64 {
        let value = self.min_temp.map_or(value, |min| value.max(min));
        self.max_temp.map_or(value, |max| value.min(max))
    }
}

/// The command an actor should carry out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorTarget {
    pub hvac_mode: String,
    /// `None` when switching off.
    pub setpoint: Option<Setpoint>,
}

impl ActorTarget {
    /// Render as climate service data.
    ///
    /// ```
    /// # use thermo_domain::actor::ActorTarget;
    /// # use thermo_domain::value::Setpoint;
    /// let target = ActorTarget {
    ///     hvac_mode: "heat_cool".to_string(),
    ///     setpoint: Some(Setpoint::Range { min: 65.0, max: 70.0 }),
    /// };
    /// assert_eq!(
    ///     target.service_data(),
    ///     serde_json::json!({
    ///         "hvac_mode": "heat_cool",
    ///         "target_temp_low": 65.0,
    ///         "target_temp_high": 70.0,
    ///     })
    /// );
    /// ```
    #[must_use]
    pub fn service_data(&self) -> serde_json::Value {
        let mut data = serde_json::json!({ "hvac_mode": self.hvac_mode });
        match self.setpoint {
            Some(Setpoint::Temperature { value }) => {
                data["temperature"] = value.into();
            }
            Some(Setpoint::Range { min, max }) => {
                data["target_temp_low"] = min.into();
                data["target_temp_high"] = max.into();
            }
            Some(Setpoint::Off) | None => {}
        }
        data
    }
}

impl fmt::Display for ActorTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.setpoint {
            Some(setpoint) => write!(f, "{} {setpoint}", self.hvac_mode),
            None => f.write_str(&self.hvac_mode),
        }
    }
}

fn default_hvac_mode_on() -> String {
    "heat".to_string()
}

/// An actor as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActorDef {
    pub hvac_mode_on: String,
    pub send_retries: u32,
    /// Seconds between attempts.
    pub send_retry_interval: u64,
    /// Shift applied to the lower and upper bound; a single temperature
    /// uses the first element.
    pub delta: [f64; 2],
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
}

impl Default for ActorDef {
    fn default() -> Self {
        Self {
            hvac_mode_on: default_hvac_mode_on(),
            send_retries: 3,
            send_retry_interval: 30,
            delta: [0.0, 0.0],
            min_temp: None,
            max_temp: None,
        }
    }
}

impl ActorDef {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidActor`] when the mode is empty or
    /// `off`, the retry interval is zero, a number is not finite, or
    /// `min_temp > max_temp`, or `delta[0] > delta[1]`.
    pub fn build(&self, id: ActorId) -> Result<Actor, ConfigError> {
        let invalid = |reason| ConfigError::InvalidActor {
            actor: id.clone(),
            reason,
        };

        let mode = self.hvac_mode_on.trim();
        if mode.is_empty() || mode.eq_ignore_ascii_case(MODE_OFF) {
            return Err(invalid("hvac_mode_on must name an operating mode other than off"));
        }
        if self.send_retry_interval == 0 {
            return Err(invalid("send_retry_interval must be greater than zero"));
        }
        if !self.delta.iter().all(|d| d.is_finite())
            || !self.min_temp.is_none_or(f64::is_finite)
            || !self.max_temp.is_none_or(f64::is_finite)
        {
            return Err(invalid("delta and temperature limits must be finite"));
        }
        if self.delta[0] > self.delta[1] {
            return Err(invalid("delta lower shift must not exceed the upper shift"));
        }
        if let (Some(min), Some(max)) = (self.min_temp, self.max_temp)
            && min > max
        {
            return Err(invalid("min_temp must not exceed max_temp"));
        }

        Ok(Actor {
            id,
            hvac_mode_on: mode.to_string(),
            send_retries: self.send_retries,
            send_retry_interval: Duration::from_secs(self.send_retry_interval),
            delta: self.delta,
            min_temp: self.min_temp,
            max_temp: self.max_temp,
        })
    }
}
