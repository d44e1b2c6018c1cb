//! Tree-walking evaluator.

use std::fmt;

use crate::error::{EvalError, StateUnavailable};
use crate::time::LocalTime;
use crate::value::Value;

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::env::Environment;

/// Maximum nesting of helper calls.
pub const MAX_CALL_DEPTH: usize = 32;

/// Read-only view of the platform state for one resolution pass.
pub trait StateLookup {
    /// Current state of `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StateUnavailable`] when the store has no usable value.
    fn state(&self, entity_id: &str) -> Result<&str, StateUnavailable>;

    /// Local wall-clock time of the pass.
    fn now(&self) -> LocalTime;
}

/// Control directive produced by a control rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directive {
    /// Skip this rule.
    Next,
    /// Stop evaluating the current list.
    Break,
    /// Yield a value; `is_overlay` on the value carries the overlay tag.
    Mark(Value),
}

/// What a control rule's expression decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Directive(Directive),
    /// A plain scalar/range/off result, treated like `Mark(value)`.
    Value(Value),
}

/// Runtime value of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    None,
    Bool(bool),
    Number(f64),
    Str(String),
    Range(f64, f64),
    Off,
    Overlay,
    Directive(Directive),
}

impl Dynamic {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Range(..) => "range",
            Self::Off => "off",
            Self::Overlay => "overlay",
            Self::Directive(_) => "directive",
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Range(..) | Self::Off | Self::Overlay | Self::Directive(_) => true,
        }
    }

    /// Interpret as a schedulable value, if it has that shape.
    #[must_use]
    pub fn as_value(&self) -> Option<Value> {
        match self {
            Self::Number(n) => Value::temperature(*n).ok(),
            Self::Range(min, max) => Value::range(*min, *max).ok(),
            Self::Off => Some(Value::off()),
            _ => None,
        }
    }

    fn loosely_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Range(a1, a2), Self::Range(b1, b2)) => a1 == b1 && a2 == b2,
            (Self::None, Self::None) | (Self::Off, Self::Off) | (Self::Overlay, Self::Overlay) => {
                true
            }
            (Self::Directive(a), Self::Directive(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("none"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Range(min, max) => write!(f, "[{min}, {max}]"),
            Self::Off => f.write_str("OFF"),
            Self::Overlay => f.write_str("OVERLAY"),
            Self::Directive(d) => write!(f, "{d:?}"),
        }
    }
}

/// Map the final result of a control rule onto a [`Verdict`].
///
/// `none` means "no opinion" and maps to `Next`.
///
/// # Errors
///
/// Returns [`EvalError::NotADirective`] for booleans, strings and the
/// overlay marker.
pub fn into_verdict(result: Dynamic) -> Result<Verdict, EvalError> {
    match result {
        Dynamic::Directive(directive) => Ok(Verdict::Directive(directive)),
        Dynamic::None => Ok(Verdict::Directive(Directive::Next)),
        Dynamic::Range(min, max) if min > max => Err(EvalError::InvalidRange { min, max }),
        other => other.as_value().map(Verdict::Value).ok_or(EvalError::NotADirective {
            found: other.type_name(),
        }),
    }
}

pub(crate) struct Evaluator<'a, S: ?Sized> {
    env: &'a Environment,
    state: &'a S,
}

type Scope<'s> = &'s [(String, Dynamic)];

impl<'a, S: StateLookup + ?Sized> Evaluator<'a, S> {
    pub(crate) fn new(env: &'a Environment, state: &'a S) -> Self {
        Self { env, state }
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Dynamic, EvalError> {
        self.eval_in(expr, &[], 0)
    }

    fn eval_in(&self, expr: &Expr, scope: Scope<'_>, depth: usize) -> Result<Dynamic, EvalError> {
        match expr {
            Expr::Number(n) => Ok(Dynamic::Number(*n)),
            Expr::Str(s) => Ok(Dynamic::Str(s.clone())),
            Expr::Bool(b) => Ok(Dynamic::Bool(*b)),
            Expr::None => Ok(Dynamic::None),
            Expr::Off => Ok(Dynamic::Off),
            Expr::Overlay => Ok(Dynamic::Overlay),
            Expr::Range(min, max) => {
                let min = number("[min, max]", self.eval_in(min, scope, depth)?)?;
                let max = number("[min, max]", self.eval_in(max, scope, depth)?)?;
                if min > max {
                    return Err(EvalError::InvalidRange { min, max });
                }
                Ok(Dynamic::Range(min, max))
            }
            Expr::Var(name) => scope
                .iter()
                .rev()
                .find(|(param, _)| param == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
            Expr::Unary { op, operand } => {
                let value = self.eval_in(operand, scope, depth)?;
                match op {
                    UnaryOp::Not => Ok(Dynamic::Bool(!value.is_truthy())),
                    UnaryOp::Neg => Ok(Dynamic::Number(-number("-", value)?)),
                }
            }
            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs, scope, depth),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval_in(cond, scope, depth)?.is_truthy() {
                    self.eval_in(then, scope, depth)
                } else {
                    self.eval_in(otherwise, scope, depth)
                }
            }
            Expr::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval_in(arg, scope, depth))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, args, depth)
            }
        }
    }

    fn binary(
        &self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        scope: Scope<'_>,
        depth: usize,
    ) -> Result<Dynamic, EvalError> {
        let left = self.eval_in(lhs, scope, depth)?;
        match op {
            BinaryOp::And if !left.is_truthy() => return Ok(left),
            BinaryOp::Or if left.is_truthy() => return Ok(left),
            _ => {}
        }
        let right = self.eval_in(rhs, scope, depth)?;

        match op {
            BinaryOp::Eq => Ok(Dynamic::Bool(left.loosely_equals(&right))),
            BinaryOp::Ne => Ok(Dynamic::Bool(!left.loosely_equals(&right))),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = match (&left, &right) {
                    (Dynamic::Number(a), Dynamic::Number(b)) => a.partial_cmp(b),
                    (Dynamic::Str(a), Dynamic::Str(b)) => Some(a.cmp(b)),
                    (Dynamic::Number(_) | Dynamic::Str(_), other) | (other, _) => {
                        return Err(EvalError::TypeMismatch {
                            operation: op.symbol(),
                            found: other.type_name(),
                        });
                    }
                };
                let Some(ordering) = ordering else {
                    return Ok(Dynamic::Bool(false));
                };
                Ok(Dynamic::Bool(match op {
                    BinaryOp::Lt => ordering.is_lt(),
                    BinaryOp::Le => ordering.is_le(),
                    BinaryOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }))
            }
            BinaryOp::Add => match (left, right) {
                (Dynamic::Str(a), Dynamic::Str(b)) => Ok(Dynamic::Str(a + &b)),
                (a, b) => Ok(Dynamic::Number(number("+", a)? + number("+", b)?)),
            },
            BinaryOp::Sub => Ok(Dynamic::Number(number("-", left)? - number("-", right)?)),
            BinaryOp::Mul => Ok(Dynamic::Number(number("*", left)? * number("*", right)?)),
            BinaryOp::Div => {
                let divisor = number("/", right)?;
                if divisor == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(Dynamic::Number(number("/", left)? / divisor))
            }
            // the left operand did not decide the result
            BinaryOp::And | BinaryOp::Or => Ok(right),
        }
    }

    fn call(&self, name: &str, args: Vec<Dynamic>, depth: usize) -> Result<Dynamic, EvalError> {
        if let Some(builtin) = super::builtins::Builtin::lookup(name) {
            return builtin.call(args, self.state);
        }

        let helper = self
            .env
            .helper(name)
            .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        if args.len() != helper.params.len() {
            return Err(EvalError::Arity {
                function: name.to_string(),
                expected: arity_label(helper.params.len()),
                found: args.len(),
            });
        }
        if depth >= MAX_CALL_DEPTH {
            return Err(EvalError::RecursionLimit(MAX_CALL_DEPTH));
        }

        let scope: Vec<(String, Dynamic)> = helper.params.iter().cloned().zip(args).collect();
        self.eval_in(&helper.body, &scope, depth + 1)
    }
}

pub(crate) fn number(operation: &'static str, value: Dynamic) -> Result<f64, EvalError> {
    match value {
        Dynamic::Number(n) => Ok(n),
        other => Err(EvalError::TypeMismatch {
            operation,
            found: other.type_name(),
        }),
    }
}

pub(crate) fn arity_label(count: usize) -> &'static str {
    match count {
        0 => "0",
        1 => "1",
        2 => "2",
        3 => "3",
        4 => "4",
        _ => "several",
    }
}
