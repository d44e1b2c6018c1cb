//! Abstract syntax tree of the rule expression language.

use std::fmt;

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    None,
    /// The `OFF` value literal.
    Off,
    /// The `OVERLAY` marker accepted by `Mark(value, OVERLAY)`.
    Overlay,
    /// `[min, max]`
    Range(Box<Expr>, Box<Expr>),
    /// A helper parameter.
    Var(String),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `then if cond else otherwise`
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl Expr {
    /// Visit every function call in the tree, depth first.
    pub fn walk_calls<'a>(&'a self, visit: &mut impl FnMut(&'a str, &'a [Expr])) {
        match self {
            Self::Call { name, args } => {
                visit(name, args);
                for arg in args {
                    arg.walk_calls(visit);
                }
            }
            Self::Range(min, max) => {
                min.walk_calls(visit);
                max.walk_calls(visit);
            }
            Self::Unary { operand, .. } => operand.walk_calls(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk_calls(visit);
                rhs.walk_calls(visit);
            }
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.walk_calls(visit);
                then.walk_calls(visit);
                otherwise.walk_calls(visit);
            }
            Self::Number(_)
            | Self::Str(_)
            | Self::Bool(_)
            | Self::None
            | Self::Off
            | Self::Overlay
            | Self::Var(_) => {}
        }
    }

    /// Visit every variable reference in the tree.
    pub fn walk_vars<'a>(&'a self, visit: &mut impl FnMut(&'a str)) {
        match self {
            Self::Var(name) => visit(name),
            Self::Call { args, .. } => {
                for arg in args {
                    arg.walk_vars(visit);
                }
            }
            Self::Range(min, max) => {
                min.walk_vars(visit);
                max.walk_vars(visit);
            }
            Self::Unary { operand, .. } => operand.walk_vars(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk_vars(visit);
                rhs.walk_vars(visit);
            }
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.walk_vars(visit);
                then.walk_vars(visit);
                otherwise.walk_vars(visit);
            }
            Self::Number(_)
            | Self::Str(_)
            | Self::Bool(_)
            | Self::None
            | Self::Off
            | Self::Overlay => {}
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::None => f.write_str("none"),
            Self::Off => f.write_str("OFF"),
            Self::Overlay => f.write_str("OVERLAY"),
            Self::Range(min, max) => write!(f, "[{min}, {max}]"),
            Self::Var(name) => f.write_str(name),
            Self::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            Self::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "-{operand}"),
            Self::Unary {
                op: UnaryOp::Not,
                operand,
            } => write!(f, "not {operand}"),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Self::Conditional {
                cond,
                then,
                otherwise,
            } => write!(f, "({then} if {cond} else {otherwise})"),
        }
    }
}
