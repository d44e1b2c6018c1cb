//! Lexer — turns expression source into a flat token stream.
//!
//! Built from `nom` combinators, one small parser per token class. Byte
//! offsets are kept on every token for error reporting.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while};
use nom::character::complete::{anychar, char, digit1, multispace1, not_line_ending, satisfy};
use nom::combinator::{map, map_res, opt, recognize, value};
use nom::multi::many0_count;
use nom::sequence::{delimited, pair, preceded};

use crate::error::{SyntaxError, SyntaxErrorKind};

type LexResult<'a, T> = IResult<&'a str, T>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    // keywords
    And,
    Or,
    Not,
    If,
    Else,
    True,
    False,
    None,
    // punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Assign,
    // operators
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Number(n) => format!("number {n}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::Ident(name) => format!("identifier `{name}`"),
            Self::And => "`and`".to_string(),
            Self::Or => "`or`".to_string(),
            Self::Not => "`not`".to_string(),
            Self::If => "`if`".to_string(),
            Self::Else => "`else`".to_string(),
            Self::True => "`true`".to_string(),
            Self::False => "`false`".to_string(),
            Self::None => "`none`".to_string(),
            Self::LParen => "`(`".to_string(),
            Self::RParen => "`)`".to_string(),
            Self::LBracket => "`[`".to_string(),
            Self::RBracket => "`]`".to_string(),
            Self::Comma => "`,`".to_string(),
            Self::Assign => "`=`".to_string(),
            Self::Plus => "`+`".to_string(),
            Self::Minus => "`-`".to_string(),
            Self::Star => "`*`".to_string(),
            Self::Slash => "`/`".to_string(),
            Self::EqEq => "`==`".to_string(),
            Self::NotEq => "`!=`".to_string(),
            Self::Lt => "`<`".to_string(),
            Self::Le => "`<=`".to_string(),
            Self::Gt => "`>`".to_string(),
            Self::Ge => "`>=`".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

/// Tokenize `source`, skipping whitespace and `#` comments.
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut remaining = source;

    loop {
        if let Ok((rest, ())) = trivia(remaining) {
            remaining = rest;
        }
        if remaining.is_empty() {
            return Ok(tokens);
        }

        let offset = source.len() - remaining.len();
        let (rest, kind) = token(remaining).map_err(|_| SyntaxError {
            offset,
            kind: failure(remaining),
        })?;
        tokens.push(Token { kind, offset });
        remaining = rest;
    }
}

/// Explain why no token starts at the head of `input`.
fn failure(input: &str) -> SyntaxErrorKind {
    if let Ok((_, text)) = number_text(input) {
        return SyntaxErrorKind::InvalidNumber(text.to_string());
    }
    match input.chars().next() {
        Some('"' | '\'') => SyntaxErrorKind::UnterminatedString,
        Some(c) => SyntaxErrorKind::UnexpectedChar(c),
        None => SyntaxErrorKind::UnexpectedEnd {
            expected: "a token",
        },
    }
}

fn trivia(input: &str) -> LexResult<'_, ()> {
    value(
        (),
        many0_count(alt((multispace1, preceded(char('#'), not_line_ending)))),
    )(input)
}

fn token(input: &str) -> LexResult<'_, TokenKind> {
    alt((string, number, word, operator, delimiter))(input)
}

/// A string between `quote`s; a backslash takes the next character literally.
fn quoted<'a>(quote: char) -> impl FnMut(&'a str) -> LexResult<'a, String> {
    let stop = if quote == '"' { "\\\"" } else { "\\'" };
    move |input| {
        delimited(
            char(quote),
            map(
                opt(escaped_transform(is_not(stop), '\\', anychar)),
                Option::unwrap_or_default,
            ),
            char(quote),
        )(input)
    }
}

fn string(input: &str) -> LexResult<'_, TokenKind> {
    map(alt((quoted('"'), quoted('\''))), TokenKind::Str)(input)
}

/// Digits and dots, starting with a digit or with a dot before a digit.
fn number_text(input: &str) -> LexResult<'_, &str> {
    recognize(pair(
        alt((digit1, recognize(pair(char('.'), digit1)))),
        take_while(|c: char| c.is_ascii_digit() || c == '.'),
    ))(input)
}

fn number(input: &str) -> LexResult<'_, TokenKind> {
    map_res(number_text, |text: &str| {
        text.parse::<f64>().map(TokenKind::Number)
    })(input)
}

fn word(input: &str) -> LexResult<'_, TokenKind> {
    map(
        recognize(pair(
            satisfy(|c| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        keyword_or_ident,
    )(input)
}

/// Two-character operators come first so `<=` never lexes as `<` `=`.
fn operator(input: &str) -> LexResult<'_, TokenKind> {
    alt((
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::NotEq, tag("!=")),
        value(TokenKind::Le, tag("<=")),
        value(TokenKind::Ge, tag(">=")),
        value(TokenKind::Assign, char('=')),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
    ))(input)
}

fn delimiter(input: &str) -> LexResult<'_, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Comma, char(',')),
    ))(input)
}

fn keyword_or_ident(word: &str) -> TokenKind {
    match word {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "true" | "True" => TokenKind::True,
        "false" | "False" => TokenKind::False,
        "none" | "None" => TokenKind::None,
        _ => TokenKind::Ident(word.to_string()),
    }
}
