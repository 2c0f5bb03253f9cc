//! Lexer/tokenizer for the query language.
//!
//! Keywords and operator symbols are recognized via the operator
//! registry, longest symbol first, so `<=` can never lex as `<` `=`.
//! Anything that is not a keyword is consumed by the literal sub-lexer:
//! single- or double-quoted strings (backslash-escaped quote only) or
//! an unquoted run of word/path characters, post-processed into
//! integer, float, or byte-size values where they look numeric.

use std::fmt;

use winnow::combinator::alt;
use winnow::prelude::*;
use winnow::token::take_while;

use super::ast::RESERVED_WORDS;
use super::error::QueryError;
use super::ops::OperatorRegistry;

/// Size suffixes convert a numeric literal to a byte count.
const SIZE_UNITS: &[(char, i64)] = &[
    ('K', 1 << 10),
    ('M', 1 << 20),
    ('G', 1 << 30),
    ('T', 1 << 40),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A reserved keyword, parenthesis, or registered operator symbol.
    Sym(String),
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Sym(s) => write!(f, "{}", s),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(x) => write!(f, "{}", x),
        }
    }
}

// Manually define PResult for resilience against winnow version changes
type PResult<T> = Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

fn backtrack() -> winnow::error::ErrMode<winnow::error::ContextError> {
    winnow::error::ErrMode::Backtrack(winnow::error::ContextError::default())
}

/// Tokenize the entire input.
pub fn lex(raw: &str, ops: &OperatorRegistry) -> Result<Vec<Token>, QueryError> {
    let keywords = keyword_table(ops);
    let mut rest = raw.trim_start();
    let mut tokens = Vec::new();

    while !rest.is_empty() {
        if let Some(keyword) = keywords.iter().find(|kw| rest.starts_with(kw.as_str())) {
            tokens.push(Token::Sym(keyword.clone()));
            rest = &rest[keyword.len()..];
        } else {
            let mut input = rest;
            match lex_literal(&mut input) {
                Ok(token) => {
                    tokens.push(token);
                    rest = input;
                }
                Err(_) => return Err(QueryError::Lex(rest.to_string())),
            }
        }
        rest = rest.trim_start();
    }

    Ok(tokens)
}

/// Every keyword the lexer recognizes: parentheses, the `attr` marker,
/// the reserved property words, and all registered operator symbols.
/// Longest first.
fn keyword_table(ops: &OperatorRegistry) -> Vec<String> {
    let mut keywords: Vec<String> = ["(", ")", "attr"]
        .iter()
        .map(|s| s.to_string())
        .chain(RESERVED_WORDS.iter().map(|s| s.to_string()))
        .chain(ops.symbols().map(str::to_string))
        .collect();
    keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));
    keywords
}

fn lex_literal(input: &mut &str) -> PResult<Token> {
    alt((lex_quoted, lex_word)).parse_next(input)
}

/// A single- or double-quoted string. Only a backslash-escaped quote
/// character is special; any other backslash passes through verbatim.
fn lex_quoted(input: &mut &str) -> PResult<Token> {
    let whole: &str = *input;
    let quote = match whole.chars().next() {
        Some(c @ ('\'' | '"')) => c,
        _ => return Err(backtrack()),
    };

    let body = &whole[1..];
    let mut out = String::new();
    let mut iter = body.char_indices().peekable();
    while let Some((idx, c)) = iter.next() {
        if c == '\\' && iter.peek().is_some_and(|&(_, next)| next == quote) {
            out.push(quote);
            iter.next();
        } else if c == quote {
            *input = &body[idx + 1..];
            return Ok(Token::Str(out));
        } else {
            out.push(c);
        }
    }

    // Unterminated quote: no literal pattern matches.
    Err(backtrack())
}

/// An unquoted run of word/path characters.
fn lex_word(input: &mut &str) -> PResult<Token> {
    let word = take_while(1.., |c: char| {
        c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':')
    })
    .parse_next(input)?;
    Ok(literal_token(word))
}

/// Literal post-processing: purely numeric runs become integers or
/// floats, a numeric run with a trailing size unit becomes a byte
/// count, everything else stays a string.
fn literal_token(word: &str) -> Token {
    if let Some(token) = numeric_token(word) {
        return token;
    }

    if word.len() > 1 {
        let (head, unit) = word.split_at(word.len() - 1);
        let multiplier = unit
            .chars()
            .next()
            .and_then(|c| SIZE_UNITS.iter().find(|(u, _)| *u == c))
            .map(|(_, m)| *m);
        if let Some(multiplier) = multiplier {
            match numeric_token(head) {
                Some(Token::Int(n)) => return Token::Int(n.saturating_mul(multiplier)),
                Some(Token::Float(x)) => return Token::Float(x * multiplier as f64),
                _ => {}
            }
        }
    }

    Token::Str(word.to_string())
}

fn numeric_token(word: &str) -> Option<Token> {
    if word.is_empty() {
        return None;
    }
    if word.bytes().all(|b| b.is_ascii_digit()) {
        return word.parse().ok().map(Token::Int);
    }
    if let Some((whole, frac)) = word.split_once('.')
        && !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && !frac.is_empty()
        && frac.bytes().all(|b| b.is_ascii_digit())
    {
        return word.parse().ok().map(Token::Float);
    }
    None
}
