//! Configuration loading — TOML file with environment variable overrides.
//!
//! Reads `thermod.toml` from the working directory, or the file named by
//! `THERMOD_CONFIG`. Every section has a default so the file is optional;
//! without rooms the daemon just idles. Environment variables take
//! precedence over file values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thermo_domain::error::ConfigError as RoomError;
use thermo_domain::id::{EntityId, RoomId};
use thermo_domain::room::RoomDef;

/// Default configuration file name.
pub const DEFAULT_PATH: &str = "thermod.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Scheduler settings shared by every room.
    pub scheduler: SchedulerConfig,
    /// Helper functions available to every expression.
    pub environment: EnvironmentConfig,
    /// Initial states of the virtual platform.
    #[serde(rename = "virtual")]
    pub platform: VirtualConfig,
    /// Rooms by id, kept as raw tables so each one is decoded on its own.
    pub rooms: BTreeMap<RoomId, toml::Value>,
}

/// Room definitions split into the decodable ones and the rejected ones.
#[derive(Debug, Default)]
pub struct RoomDefs {
    pub decoded: Vec<(RoomId, RoomDef)>,
    pub malformed: Vec<(RoomId, RoomError)>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Scheduler configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Send every room's value at startup instead of after its first delay.
    pub reset_at_startup: bool,
    /// Capacity of the state-change bus.
    pub event_buffer: usize,
    /// Capacity of each room's inbox.
    pub inbox_capacity: usize,
}

/// Expression environment configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Helper definitions, one `name(params) = expression` per line.
    pub source: String,
    /// File holding more helper definitions, appended to `source`.
    pub path: Option<PathBuf>,
}

/// Virtual platform configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    pub states: BTreeMap<EntityId, String>,
}

impl Config {
    /// Load configuration from `THERMOD_CONFIG` or `thermod.toml` (if
    /// present) then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is unreadable or
    /// malformed, or if a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("THERMOD_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("THERMOD_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("THERMOD_RESET_AT_STARTUP")
            && let Ok(reset) = val.parse()
        {
            self.scheduler.reset_at_startup = reset;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.event_buffer == 0 {
            return Err(ConfigError::Validation(
                "scheduler.event_buffer must be non-zero".to_string(),
            ));
        }
        if self.scheduler.inbox_capacity == 0 {
            return Err(ConfigError::Validation(
                "scheduler.inbox_capacity must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Decode every room table. A room that does not decode is reported
    /// without affecting the others.
    #[must_use]
    pub fn room_defs(&self) -> RoomDefs {
        let mut defs = RoomDefs::default();
        for (id, table) in &self.rooms {
            match table.clone().try_into::<RoomDef>() {
                Ok(def) => defs.decoded.push((id.clone(), def)),
                Err(err) => defs.malformed.push((
                    id.clone(),
                    RoomError::MalformedRoom {
                        reason: err.message().to_string(),
                    },
                )),
            }
        }
        defs
    }

    /// Helper definitions from the inline source and the optional file.
    ///
    /// # Errors
    ///
    /// Returns an error if `environment.path` cannot be read.
    pub fn environment_source(&self) -> Result<String, ConfigError> {
        let mut source = self.environment.source.clone();
        if let Some(path) = &self.environment.path {
            let extra = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
            if !source.is_empty() && !source.ends_with('\n') {
                source.push('\n');
            }
            source.push_str(&extra);
        }
        Ok(source)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "thermod=info,thermo_app=info,thermo_adapter_virtual=info".to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reset_at_startup: false,
            event_buffer: 256,
            inbox_capacity: thermo_app::scheduler::DEFAULT_INBOX_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert!(!config.scheduler.reset_at_startup);
        assert_eq!(config.scheduler.event_buffer, 256);
        assert!(config.environment.source.is_empty());
        assert!(config.rooms.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.scheduler.event_buffer, 256);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = r#"
            [logging]
            filter = 'debug'

            [scheduler]
            reset_at_startup = true
            event_buffer = 32

            [environment]
            source = """
            is_home() = is_state("person.owner", "home")
            """

            [virtual.states]
            "person.owner" = "home"

            [rooms.living]
            rescheduling_delay = 30
            grace_period = 120
            watched_entities = ["sensor.outdoor_temperature"]
            enabled_entity = "input_boolean.heating_enabled"

            [rooms.living.actors."climate.living"]
            hvac_mode_on = "heat_cool"
            send_retries = 7
            send_retry_interval = 1

            [[rooms.living.schedule]]
            x = "Mark(OFF, OVERLAY) if is_home() else Next()"

            [[rooms.living.schedule]]
            rules = [{ v = [65, 70], weekdays = "1-5", start = "07:00", end = "22:00" }]

            [[rooms.living.schedule]]
            v = [62, 80]
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.filter, "debug");
        assert!(config.scheduler.reset_at_startup);
        assert_eq!(config.scheduler.event_buffer, 32);
        assert!(config.environment.source.contains("is_home()"));
        assert_eq!(
            config.platform.states.get(&EntityId::new("person.owner")).map(String::as_str),
            Some("home")
        );

        let defs = config.room_defs();
        assert!(defs.malformed.is_empty());
        let (id, living) = &defs.decoded[0];
        assert_eq!(id.as_str(), "living");
        assert_eq!(living.rescheduling_delay, 30);
        assert_eq!(living.grace_period, 120);
        assert_eq!(living.schedule.len(), 3);
        assert_eq!(living.actors.len(), 1);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.scheduler.event_buffer, 256);
    }

    #[test]
    fn should_reject_zero_event_buffer() {
        let mut config = Config::default();
        config.scheduler.event_buffer = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_keep_valid_room_next_to_malformed_one() {
        let toml = r#"
            [rooms.living.actors."climate.living"]

            [[rooms.living.schedule]]
            v = 62

            [rooms.bedroom.actors."climate.bedroom"]

            [[rooms.bedroom.schedule]]
            v = 64
            weekday = "1-5"
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        let defs = config.room_defs();

        assert_eq!(defs.decoded.len(), 1);
        assert_eq!(defs.decoded[0].0.as_str(), "living");
        assert_eq!(defs.malformed.len(), 1);
        let (id, error) = &defs.malformed[0];
        assert_eq!(id.as_str(), "bedroom");
        assert!(
            matches!(error, RoomError::MalformedRoom { reason } if reason.contains("`weekday`"))
        );
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_use_inline_environment_source_without_path() {
        let mut config = Config::default();
        config.environment.source = "is_home() = is_state('person.owner', 'home')".to_string();
        assert_eq!(
            config.environment_source().unwrap(),
            "is_home() = is_state('person.owner', 'home')"
        );
    }

    #[test]
    fn should_fail_when_environment_file_is_missing() {
        let mut config = Config::default();
        config.environment.path = Some(PathBuf::from("nonexistent-helpers.txt"));
        assert!(matches!(config.environment_source(), Err(ConfigError::Io(_))));
    }
}
