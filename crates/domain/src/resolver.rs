//! Rule resolver — walks a schedule and picks the room's value.
//!
//! Each list is scanned in order with two slots, `current` and `overlay`:
//!
//! - a matching value rule fills `current` if it is still empty;
//! - a matching group is resolved recursively, its overlay result replaces
//!   `overlay` and its plain result fills `current` if still empty;
//! - a control rule can skip (`Next`), stop the list (`Break`, or any
//!   evaluation error), or mark a value into either slot.
//!
//! A list yields `overlay` if set, otherwise `current`. When the top-level
//! list yields nothing the schedule default applies.
//!
//! The resolver does no IO and never logs; evaluation errors are returned in
//! the [`Resolution`] for the caller to report.

use std::fmt;

use crate::error::EvalError;
use crate::expr::{Directive, Environment, StateLookup, Verdict};
use crate::rule::{Rule, RulePath, Schedule};
use crate::value::Value;
use crate::window::TimeWindow;

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The trailing default of the schedule.
    Default,
    /// A value rule or control rule at this position.
    Rule(RulePath),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Rule(path) => path.fmt(f),
        }
    }
}

/// A control rule that failed to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleError {
    pub path: RulePath,
    pub expression: String,
    pub error: EvalError,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}`: {}", self.path, self.expression, self.error)
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub value: Value,
    pub source: Source,
    /// Evaluation errors met on the way; each one stopped its list.
    pub errors: Vec<RuleError>,
}

/// Resolve `schedule` against one state snapshot.
#[must_use]
pub fn resolve<S: StateLookup + ?Sized>(
    schedule: &Schedule,
    env: &Environment,
    state: &S,
) -> Resolution {
    let mut resolver = Resolver {
        env,
        state,
        errors: Vec::new(),
    };
    let found = resolver.list(schedule.rules(), None);
    let (value, source) = match found {
        Some((value, path)) => (value, Source::Rule(path)),
        None => (schedule.default_value(), Source::Default),
    };
    Resolution {
        value,
        source,
        errors: resolver.errors,
    }
}

struct Resolver<'a, S: ?Sized> {
    env: &'a Environment,
    state: &'a S,
    errors: Vec<RuleError>,
}

impl<S: StateLookup + ?Sized> Resolver<'_, S> {
    fn matches(&self, window: Option<&TimeWindow>) -> bool {
        window.is_none_or(|window| window.matches(&self.state.now()))
    }

    fn list(&mut self, rules: &[Rule], parent: Option<&RulePath>) -> Option<(Value, RulePath)> {
        let mut current: Option<(Value, RulePath)> = None;
        let mut overlay: Option<(Value, RulePath)> = None;

        for (index, rule) in rules.iter().enumerate() {
            let path = parent.map_or_else(|| RulePath::root(index), |p| p.child(index));

            let yielded = match rule {
                Rule::Value { value, window } => self.matches(window.as_ref()).then_some(*value),
                Rule::Group { rules, window } => {
                    if !self.matches(window.as_ref()) {
                        continue;
                    }
                    if let Some((value, inner)) = self.list(rules, Some(&path)) {
                        place(&mut current, &mut overlay, value, inner);
                    }
                    continue;
                }
                Rule::Control { expr } => match expr.evaluate(self.env, self.state) {
                    Ok(Verdict::Directive(Directive::Next)) => None,
                    Ok(Verdict::Directive(Directive::Break)) => break,
                    Ok(Verdict::Directive(Directive::Mark(value)) | Verdict::Value(value)) => {
                        Some(value)
                    }
                    Err(error) => {
                        self.errors.push(RuleError {
                            path,
                            expression: expr.source().to_string(),
                            error,
                        });
                        break;
                    }
                },
            };

            if let Some(value) = yielded {
                place(&mut current, &mut overlay, value, path);
            }
        }

        overlay.or(current)
    }
}

fn place(
    current: &mut Option<(Value, RulePath)>,
    overlay: &mut Option<(Value, RulePath)>,
    value: Value,
    path: RulePath,
) {
    if value.is_overlay {
        *overlay = Some((value, path));
    } else if current.is_none() {
        *current = Some((value, path));
    }
}
