//! Recursive-descent parser over the token stream.
//!
//! Precedence, loosest first: conditional, `or`, `and`, `not`, comparison,
//! `+ -`, `* /`, unary minus, primary.
//!
//! Nesting is capped at [`MAX_NESTING`] levels so that the parser, the
//! evaluator and every other walk over the tree stay within a small stack.

use crate::error::{SyntaxError, SyntaxErrorKind};

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::lexer::{Token, TokenKind, tokenize};

/// Deepest nesting of groups, calls, operators and conditionals accepted.
pub const MAX_NESTING: usize = 64;

/// Parse a complete expression.
///
/// # Errors
///
/// Returns a [`SyntaxError`] pointing at the first offending token.
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(source)?;
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse one helper definition: `name(param, ...) = expression`.
///
/// # Errors
///
/// Returns a [`SyntaxError`] when the line is not a well-formed definition.
pub fn parse_definition(source: &str) -> Result<(String, Vec<String>, Expr), SyntaxError> {
    let mut parser = Parser::new(source)?;
    let name = parser.ident("helper name")?;
    parser.expect(&TokenKind::LParen, "`(`")?;
    let mut params = Vec::new();
    if !parser.eat(&TokenKind::RParen) {
        loop {
            params.push(parser.ident("parameter name")?);
            if parser.eat(&TokenKind::RParen) {
                break;
            }
            parser.expect(&TokenKind::Comma, "`,` or `)`")?;
        }
    }
    parser.expect(&TokenKind::Assign, "`=`")?;
    let body = parser.expression()?;
    parser.finish()?;
    Ok((name, params, body))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    end_offset: usize,
    depth: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, SyntaxError> {
        Ok(Self {
            tokens: tokenize(source)?,
            pos: 0,
            end_offset: source.len(),
            depth: 0,
        })
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.end_offset, |token| token.offset)
    }

    /// Go one level deeper; the caller restores `depth` when done.
    fn descend(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError {
                offset: self.offset(),
                kind: SyntaxErrorKind::TooDeep { limit: MAX_NESTING },
            });
        }
        Ok(())
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        let depth = self.depth;
        self.descend()?;
        let result = parse(self);
        self.depth = depth;
        result
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|token| &token.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> SyntaxError {
        match self.tokens.get(self.pos) {
            Some(token) => SyntaxError {
                offset: token.offset,
                kind: SyntaxErrorKind::UnexpectedToken {
                    expected,
                    found: token.kind.describe(),
                },
            },
            None => SyntaxError {
                offset: self.end_offset,
                kind: SyntaxErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &'static str) -> Result<(), SyntaxError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn ident(&mut self, expected: &'static str) -> Result<String, SyntaxError> {
        if let Some(TokenKind::Ident(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Ok(name)
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn finish(&self) -> Result<(), SyntaxError> {
        if self.pos < self.tokens.len() {
            Err(self.unexpected("end of expression"))
        } else {
            Ok(())
        }
    }

    fn expression(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::conditional)
    }

    fn conditional(&mut self) -> Result<Expr, SyntaxError> {
        let then = self.or()?;
        if !self.eat(&TokenKind::If) {
            return Ok(then);
        }
        let cond = self.or()?;
        self.expect(&TokenKind::Else, "`else`")?;
        let otherwise = self.expression()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn or(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.and()?;
        while self.eat(&TokenKind::Or) {
            self.descend()?;
            let rhs = self.and()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.not()?;
        while self.eat(&TokenKind::And) {
            self.descend()?;
            let rhs = self.not()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat(&TokenKind::Not) {
            let operand = self.nested(Self::not)?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(TokenKind::EqEq) => BinaryOp::Eq,
            Some(TokenKind::NotEq) => BinaryOp::Ne,
            Some(TokenKind::Lt) => BinaryOp::Lt,
            Some(TokenKind::Le) => BinaryOp::Le,
            Some(TokenKind::Gt) => BinaryOp::Gt,
            Some(TokenKind::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        self.descend()?;
        let rhs = self.additive()?;
        Ok(binary(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn term(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            self.descend()?;
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.nested(Self::unary)?;
            return Ok(match operand {
                Expr::Number(n) => Expr::Number(-n),
                other => Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(other),
                },
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected("an expression"));
        };
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::True => Ok(Expr::Bool(true)),
            TokenKind::False => Ok(Expr::Bool(false)),
            TokenKind::None => Ok(Expr::None),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                let min = self.expression()?;
                self.expect(&TokenKind::Comma, "`,`")?;
                let max = self.expression()?;
                self.expect(&TokenKind::RBracket, "`]`")?;
                Ok(Expr::Range(Box::new(min), Box::new(max)))
            }
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen) {
                    let args = self.arguments()?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(match name.as_str() {
                    "OFF" => Expr::Off,
                    "OVERLAY" => Expr::Overlay,
                    _ => Expr::Var(name),
                })
            }
            _ => {
                self.pos -= 1;
                Err(self.unexpected("an expression"))
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&TokenKind::RParen) {
                return Ok(args);
            }
            self.expect(&TokenKind::Comma, "`,` or `)`")?;
        }
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> String {
        parse_expression(source).unwrap().to_string()
    }

    #[test]
    fn should_bind_multiplication_tighter_than_addition() {
        assert_eq!(parse("1 + 2 * 3"), "(1 + (2 * 3))");
    }

    #[test]
    fn should_bind_and_tighter_than_or() {
        assert_eq!(parse("a or b and not c"), "(a or (b and not c))");
    }

    #[test]
    fn should_parse_python_style_conditional() {
        assert_eq!(
            parse("Break() if not is_home() else Next()"),
            "(Break() if not is_home() else Next())"
        );
    }

    #[test]
    fn should_chain_conditionals_to_the_right() {
        assert_eq!(parse("1 if a else 2 if b else 3"), "(1 if a else (2 if b else 3))");
    }

    #[test]
    fn should_parse_mark_with_range_and_overlay() {
        let expr = parse_expression("Mark([65, 70], OVERLAY)").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                name: "Mark".to_string(),
                args: vec![
                    Expr::Range(Box::new(Expr::Number(65.0)), Box::new(Expr::Number(70.0))),
                    Expr::Overlay,
                ],
            }
        );
    }

    #[test]
    fn should_fold_negative_literals() {
        assert_eq!(parse_expression("-5").unwrap(), Expr::Number(-5.0));
    }

    #[test]
    fn should_parse_off_keyword() {
        assert_eq!(parse_expression("OFF").unwrap(), Expr::Off);
    }

    #[test]
    fn should_reject_trailing_tokens() {
        let err = parse_expression("Next() Next()").unwrap_err();
        assert_eq!(err.offset, 7);
        assert!(matches!(err.kind, SyntaxErrorKind::UnexpectedToken { .. }));
    }

    #[test]
    fn should_report_unexpected_end() {
        let err = parse_expression("1 +").unwrap_err();
        assert_eq!(err.offset, 3);
        assert!(matches!(err.kind, SyntaxErrorKind::UnexpectedEnd { .. }));
    }

    #[test]
    fn should_require_else_in_conditional() {
        assert!(parse_expression("1 if a").is_err());
    }

    #[test]
    fn should_accept_reasonable_nesting() {
        let source = format!("{}1{}", "(".repeat(40), ")".repeat(40));
        assert_eq!(parse_expression(&source).unwrap(), Expr::Number(1.0));
    }

    #[test]
    fn should_reject_runaway_parentheses() {
        let source = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        let err = parse_expression(&source).unwrap_err();
        assert_eq!(err.kind, SyntaxErrorKind::TooDeep { limit: MAX_NESTING });
    }

    #[test]
    fn should_reject_runaway_operator_chains() {
        let source = vec!["1"; 10_000].join(" + ");
        assert!(matches!(
            parse_expression(&source).unwrap_err().kind,
            SyntaxErrorKind::TooDeep { .. }
        ));

        let source = format!("{}true", "not ".repeat(10_000));
        assert!(matches!(
            parse_expression(&source).unwrap_err().kind,
            SyntaxErrorKind::TooDeep { .. }
        ));
    }

    #[test]
    fn should_parse_helper_definition() {
        let (name, params, body) =
            parse_definition("outdoor(primary, fallback) = coalesce(float(state(primary)), fallback)")
                .unwrap();
        assert_eq!(name, "outdoor");
        assert_eq!(params, vec!["primary".to_string(), "fallback".to_string()]);
        assert_eq!(
            body.to_string(),
            "coalesce(float(state(primary)), fallback)"
        );
    }

    #[test]
    fn should_parse_helper_without_parameters() {
        let (name, params, _) = parse_definition("is_home() = true").unwrap();
        assert_eq!(name, "is_home");
        assert!(params.is_empty());
    }

    #[test]
    fn should_reject_definition_without_assignment() {
        assert!(parse_definition("is_home() true").is_err());
    }
}
