//! Expression environment — the table of helper functions.
//!
//! Built once from the configured source text, then shared read-only by
//! every room. All function names used anywhere are resolved at load time.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::ConfigError;
use crate::id::EntityId;

use super::CompiledExpr;
use super::ast::Expr;
use super::builtins::Builtin;
use super::eval::MAX_CALL_DEPTH;
use super::parser::{parse_definition, parse_expression};

/// A user-defined pure function: `name(params) = body`.
#[derive(Debug, Clone, PartialEq)]
pub struct Helper {
    pub name: String,
    pub params: Vec<String>,
    pub body: Expr,
}

/// Helper functions available to control rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    helpers: BTreeMap<String, Helper>,
}

impl Environment {
    /// Parse an environment source: one `name(params) = expression` per
    /// line, blank lines and `#` comments ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a line does not parse, a name is
    /// defined twice or shadows a builtin, a helper calls an unknown
    /// function, or a helper body uses a name that is not a parameter.
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut helpers = BTreeMap::new();

        for (index, line) in source.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (name, params, body) =
                parse_definition(line).map_err(|error| ConfigError::Syntax {
                    source_text: line.to_string(),
                    error,
                })?;

            let distinct: BTreeSet<&String> = params.iter().collect();
            if distinct.len() != params.len() {
                return Err(ConfigError::MalformedHelper { line: index + 1 });
            }
            if Builtin::lookup(&name).is_some() || helpers.contains_key(&name) {
                return Err(ConfigError::DuplicateFunction { name });
            }

            helpers.insert(name.clone(), Helper { name, params, body });
        }

        let env = Self { helpers };
        for helper in env.helpers.values() {
            env.check_calls(&helper.body)?;
            let mut unbound = None;
            helper.body.walk_vars(&mut |var| {
                if unbound.is_none() && !helper.params.iter().any(|param| param == var) {
                    unbound = Some(var.to_string());
                }
            });
            if let Some(name) = unbound {
                return Err(ConfigError::UnboundVariable {
                    name,
                    context: format!("helper `{}`", helper.name),
                });
            }
        }
        Ok(env)
    }

    #[must_use]
    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn helpers(&self) -> impl Iterator<Item = &Helper> {
        self.helpers.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// Compile a control rule expression against this environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for syntax errors, unknown functions, and
    /// bare names (control rules have no parameters).
    pub fn compile(&self, source: &str) -> Result<CompiledExpr, ConfigError> {
        let ast = parse_expression(source).map_err(|error| ConfigError::Syntax {
            source_text: source.to_string(),
            error,
        })?;
        self.check_calls(&ast)?;

        let mut unbound = None;
        ast.walk_vars(&mut |var| {
            unbound.get_or_insert_with(|| var.to_string());
        });
        if let Some(name) = unbound {
            return Err(ConfigError::UnboundVariable {
                name,
                context: format!("expression {source:?}"),
            });
        }

        Ok(CompiledExpr {
            source: source.to_string(),
            ast,
        })
    }

    /// Entities an expression can read through `state()` or `is_state()`,
    /// following helper calls whose entity arguments are string literals.
    ///
    /// Entity ids computed at run time cannot be discovered this way.
    #[must_use]
    pub fn referenced_entities(&self, expr: &Expr) -> BTreeSet<EntityId> {
        let mut found = BTreeSet::new();
        self.collect_entities(expr, &[], 0, &mut found);
        found
    }

    fn check_calls(&self, expr: &Expr) -> Result<(), ConfigError> {
        let mut unknown = None;
        expr.walk_calls(&mut |name, _| {
            if unknown.is_none() && Builtin::lookup(name).is_none() && self.helper(name).is_none()
            {
                unknown = Some(name.to_string());
            }
        });
        match unknown {
            Some(name) => Err(ConfigError::UnknownFunction { name }),
            None => Ok(()),
        }
    }

    fn collect_entities(
        &self,
        expr: &Expr,
        bindings: &[(&str, Option<String>)],
        depth: usize,
        found: &mut BTreeSet<EntityId>,
    ) {
        if depth > MAX_CALL_DEPTH {
            return;
        }

        let literal = |arg: &Expr| -> Option<String> {
            match arg {
                Expr::Str(text) => Some(text.clone()),
                Expr::Var(name) => bindings
                    .iter()
                    .find(|(param, _)| param == name)
                    .and_then(|(_, bound)| bound.clone()),
                _ => None,
            }
        };

        let mut calls = Vec::new();
        expr.walk_calls(&mut |name, args| calls.push((name, args)));

        for (name, args) in calls {
            if let Some(builtin) = Builtin::lookup(name) {
                if builtin.reads_entity()
                    && let Some(entity) = args.first().and_then(literal)
                {
                    found.insert(EntityId::new(entity));
                }
            } else if let Some(helper) = self.helper(name) {
                let inner: Vec<(&str, Option<String>)> = helper
                    .params
                    .iter()
                    .map(String::as_str)
                    .zip(args.iter().map(literal).chain(std::iter::repeat(None)))
                    .collect();
                self.collect_entities(&helper.body, &inner, depth + 1, found);
            }
        }
    }
}
