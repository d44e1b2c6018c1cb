//! Builtin functions available to every expression.

use chrono::Timelike;

use crate::error::EvalError;
use crate::time::iso_weekday;

use super::eval::{Directive, Dynamic, StateLookup, arity_label, number};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Next,
    Break,
    Mark,
    State,
    IsState,
    Float,
    Coalesce,
    Min,
    Max,
    Abs,
    Round,
    Hour,
    Minute,
    Weekday,
}

impl Builtin {
    pub(crate) const NAMES: [&'static str; 14] = [
        "Next", "Break", "Mark", "state", "is_state", "float", "coalesce", "min", "max", "abs",
        "round", "hour", "minute", "weekday",
    ];

    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "Next" => Self::Next,
            "Break" => Self::Break,
            "Mark" => Self::Mark,
            "state" => Self::State,
            "is_state" => Self::IsState,
            "float" => Self::Float,
            "coalesce" => Self::Coalesce,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "round" => Self::Round,
            "hour" => Self::Hour,
            "minute" => Self::Minute,
            "weekday" => Self::Weekday,
            _ => return None,
        })
    }

    /// Whether the first argument names an entity in the state store.
    pub(crate) fn reads_entity(self) -> bool {
        matches!(self, Self::State | Self::IsState)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Next => "Next",
            Self::Break => "Break",
            Self::Mark => "Mark",
            Self::State => "state",
            Self::IsState => "is_state",
            Self::Float => "float",
            Self::Coalesce => "coalesce",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Round => "round",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Weekday => "weekday",
        }
    }

    fn check_arity(self, found: usize, range: std::ops::RangeInclusive<usize>) -> Result<(), EvalError> {
        if range.contains(&found) {
            return Ok(());
        }
        let expected = if range.start() == range.end() {
            arity_label(*range.start())
        } else if *range.end() == usize::MAX {
            "at least 1"
        } else {
            "1 or 2"
        };
        Err(EvalError::Arity {
            function: self.name().to_string(),
            expected,
            found,
        })
    }

    pub(crate) fn call<S: StateLookup + ?Sized>(
        self,
        args: Vec<Dynamic>,
        state: &S,
    ) -> Result<Dynamic, EvalError> {
        match self {
            Self::Next => {
                self.check_arity(args.len(), 0..=0)?;
                Ok(Dynamic::Directive(Directive::Next))
            }
            Self::Break => {
                self.check_arity(args.len(), 0..=0)?;
                Ok(Dynamic::Directive(Directive::Break))
            }
            Self::Mark => {
                self.check_arity(args.len(), 1..=2)?;
                let mut args = args.into_iter();
                let target = args.next().unwrap_or(Dynamic::None);
                let value = target.as_value().ok_or(EvalError::TypeMismatch {
                    operation: "Mark",
                    found: target.type_name(),
                })?;
                let value = match args.next() {
                    None => value,
                    Some(Dynamic::Overlay) => value.into_overlay(),
                    Some(other) => {
                        return Err(EvalError::TypeMismatch {
                            operation: "Mark",
                            found: other.type_name(),
                        });
                    }
                };
                Ok(Dynamic::Directive(Directive::Mark(value)))
            }
            Self::State => {
                self.check_arity(args.len(), 1..=1)?;
                let entity = entity_arg(self, &args[0])?;
                Ok(state
                    .state(entity)
                    .map_or(Dynamic::None, |value| Dynamic::Str(value.to_string())))
            }
            Self::IsState => {
                self.check_arity(args.len(), 2..=2)?;
                let entity = entity_arg(self, &args[0])?;
                let Dynamic::Str(expected) = &args[1] else {
                    return Err(EvalError::TypeMismatch {
                        operation: "is_state",
                        found: args[1].type_name(),
                    });
                };
                Ok(Dynamic::Bool(
                    state.state(entity).is_ok_and(|value| value == expected),
                ))
            }
            Self::Float => {
                self.check_arity(args.len(), 1..=1)?;
                Ok(match &args[0] {
                    Dynamic::Number(n) => Dynamic::Number(*n),
                    Dynamic::Str(text) => text
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|n| n.is_finite())
                        .map_or(Dynamic::None, Dynamic::Number),
                    _ => Dynamic::None,
                })
            }
            Self::Coalesce => {
                self.check_arity(args.len(), 1..=usize::MAX)?;
                Ok(args
                    .into_iter()
                    .find(|arg| *arg != Dynamic::None)
                    .unwrap_or(Dynamic::None))
            }
            Self::Min | Self::Max => {
                self.check_arity(args.len(), 1..=usize::MAX)?;
                let numbers = args
                    .into_iter()
                    .map(|arg| number(self.name(), arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let pick = if self == Self::Min { f64::min } else { f64::max };
                let first = numbers[0];
                Ok(Dynamic::Number(numbers.into_iter().fold(first, pick)))
            }
            Self::Abs | Self::Round => {
                self.check_arity(args.len(), 1..=1)?;
                let n = number(self.name(), args.into_iter().next().unwrap_or(Dynamic::None))?;
                Ok(Dynamic::Number(if self == Self::Abs { n.abs() } else { n.round() }))
            }
            Self::Hour | Self::Minute | Self::Weekday => {
                self.check_arity(args.len(), 0..=0)?;
                let now = state.now();
                Ok(Dynamic::Number(match self {
                    Self::Hour => f64::from(now.hour()),
                    Self::Minute => f64::from(now.minute()),
                    _ => f64::from(iso_weekday(&now)),
                }))
            }
        }
    }
}

fn entity_arg(builtin: Builtin, arg: &Dynamic) -> Result<&str, EvalError> {
    match arg {
        Dynamic::Str(entity) => Ok(entity),
        other => Err(EvalError::TypeMismatch {
            operation: builtin.name(),
            found: other.type_name(),
        }),
    }
}
