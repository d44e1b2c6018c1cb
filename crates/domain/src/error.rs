//! Error taxonomy shared across the workspace.
//!
//! Each failure class has its own typed enum, handled where it arises: no
//! class crosses into another's consequence.
//!
//! | Class | Raised by | Consequence |
//! |-------|-----------|-------------|
//! | [`ConfigError`] | room/rule/expression compilation | the room is disabled |
//! | [`EvalError`] | expression evaluation | the rule's list stops (same as `Break`) |
//! | [`StateUnavailable`] | snapshot lookups | surfaced to expressions as `none` |
//! | [`DeliveryError`] | actuator commands | retried, then reported |

use std::time::Duration;

use crate::id::{ActorId, EntityId};

/// Malformed configuration detected while building a room.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A time of day was not `HH:MM` or `HH:MM:SS`.
    #[error("invalid time of day {input:?}, expected HH:MM or HH:MM:SS")]
    InvalidTime { input: String },

    /// A weekday specification could not be parsed.
    #[error("invalid weekday specification {input:?}: {reason}")]
    InvalidWeekdays { input: String, reason: &'static str },

    /// A value literal was out of shape (non-finite, `min > max`, …).
    #[error("invalid value: {reason}")]
    InvalidValue { reason: &'static str },

    /// A rule entry did not define exactly one of `v`, `x` or `rules`.
    #[error("rule at {path} must define exactly one of `v`, `x` or `rules`")]
    AmbiguousRule { path: String },

    /// A control rule carried time-window keys.
    #[error("control rule at {path} cannot have a time window")]
    WindowOnControlRule { path: String },

    /// A rule group had no entries.
    #[error("rule group at {path} is empty")]
    EmptyGroup { path: String },

    /// The schedule did not end with a bare default value.
    #[error("schedule must end with a bare default value (no window, no expression)")]
    MissingDefault,

    /// An expression failed to parse.
    #[error("failed to parse expression {source_text:?}")]
    Syntax {
        source_text: String,
        #[source]
        error: SyntaxError,
    },

    /// An expression called a function that is neither builtin nor a helper.
    #[error("unknown function `{name}`")]
    UnknownFunction { name: String },

    /// A helper referenced a variable that is not one of its parameters.
    #[error("unbound variable `{name}` in {context}")]
    UnboundVariable { name: String, context: String },

    /// Two helpers shared a name, or a helper shadowed a builtin.
    #[error("function `{name}` is defined more than once")]
    DuplicateFunction { name: String },

    /// An environment line was not `name(params) = expression`.
    #[error("malformed helper definition on line {line}")]
    MalformedHelper { line: usize },

    /// A room definition did not have the expected shape (unknown key,
    /// wrong type, ...).
    #[error("malformed room definition: {reason}")]
    MalformedRoom { reason: String },

    /// A room declared no actors.
    #[error("room has no actors")]
    NoActors,

    /// An actor's parameters were out of range.
    #[error("actor {actor}: {reason}")]
    InvalidActor { actor: ActorId, reason: &'static str },
}

/// Lexing or parsing failure with the byte offset it occurred at.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} at offset {offset}")]
pub struct SyntaxError {
    pub offset: usize,
    pub kind: SyntaxErrorKind,
}

/// What went wrong while lexing or parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxErrorKind {
    #[error("unexpected character {0:?}")]
    UnexpectedChar(char),

    #[error("unterminated string literal")]
    UnterminatedString,

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("expected {expected}, found {found}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("expression nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Failure while evaluating an expression.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("`{function}` expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: &'static str,
        found: usize,
    },

    #[error("cannot apply `{operation}` to {found}")]
    TypeMismatch {
        operation: &'static str,
        found: &'static str,
    },

    #[error("unbound variable `{0}`")]
    UnboundVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("helper call depth exceeded {0}")]
    RecursionLimit(usize),

    #[error("a control rule must produce a directive or a value, got {found}")]
    NotADirective { found: &'static str },

    #[error("range minimum {min} is greater than maximum {max}")]
    InvalidRange { min: f64, max: f64 },
}

/// The state store has no usable value for an entity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("state of {entity_id} is unavailable")]
pub struct StateUnavailable {
    pub entity_id: EntityId,
}

/// Failure delivering a command to an actuator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeliveryError {
    /// The actuator layer refused or failed the command.
    #[error("actor {actor} rejected the command: {reason}")]
    Rejected { actor: ActorId, reason: String },

    /// The attempt neither succeeded nor failed in time.
    #[error("actor {actor} did not answer within {after:?}")]
    Timeout { actor: ActorId, after: Duration },

    /// Every attempt failed.
    #[error("actor {actor} failed after {attempts} attempt(s)")]
    RetriesExhausted {
        actor: ActorId,
        attempts: u32,
        #[source]
        last: Box<DeliveryError>,
    },
}

impl DeliveryError {
    /// The actor this failure concerns.
    #[must_use]
    pub fn actor(&self) -> &ActorId {
        match self {
            Self::Rejected { actor, .. }
            | Self::Timeout { actor, .. }
            | Self::RetriesExhausted { actor, .. } => actor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_syntax_error_with_offset() {
        let err = SyntaxError {
            offset: 4,
            kind: SyntaxErrorKind::UnexpectedChar('$'),
        };
        assert_eq!(err.to_string(), "unexpected character '$' at offset 4");
    }

    #[test]
    fn should_report_actor_of_nested_delivery_error() {
        let actor = ActorId::new("climate.living");
        let err = DeliveryError::RetriesExhausted {
            actor: actor.clone(),
            attempts: 8,
            last: Box::new(DeliveryError::Timeout {
                actor: actor.clone(),
                after: Duration::from_secs(1),
            }),
        };
        assert_eq!(err.actor(), &actor);
        assert_eq!(
            err.to_string(),
            "actor climate.living failed after 8 attempt(s)"
        );
    }

    #[test]
    fn should_display_state_unavailable() {
        let err = StateUnavailable {
            entity_id: EntityId::new("sensor.outdoor"),
        };
        assert_eq!(err.to_string(), "state of sensor.outdoor is unavailable");
    }
}
