//! Sandboxed expression language for control rules.
//!
//! Source text is tokenized, parsed into an [`Expr`] tree and evaluated by a
//! tree walker against a [`StateLookup`]. There is no access to anything
//! beyond the builtins and the helpers of an [`Environment`].

mod ast;
mod builtins;
mod env;
mod eval;
mod lexer;
mod parser;

use std::fmt;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use env::{Environment, Helper};
pub use eval::{Directive, Dynamic, MAX_CALL_DEPTH, StateLookup, Verdict, into_verdict};
pub use parser::{parse_definition, parse_expression};

use crate::error::EvalError;

/// A control rule expression, checked against an [`Environment`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    source: String,
    ast: Expr,
}

impl CompiledExpr {
    /// The text the expression was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    /// Evaluate against `state`, calling helpers from `env`.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] when evaluation fails or the result is not
    /// something a control rule can yield.
    pub fn evaluate<S: StateLookup + ?Sized>(
        &self,
        env: &Environment,
        state: &S,
    ) -> Result<Verdict, EvalError> {
        let result = eval::Evaluator::new(env, state).eval(&self.ast)?;
        into_verdict(result)
    }
}

impl fmt::Display for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
