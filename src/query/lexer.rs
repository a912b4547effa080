// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Query lexer.
//!
//! Splits a query string into tokens for the recursive-descent parser.
//! Positions are character offsets so errors can point a caret at the
//! offending spot. The only context-sensitive rules: `field:` is produced
//! only when a letter-led run is immediately followed by `:`, and `..`
//! is a range separator while a lone `.` stays part of a term.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Term(String),
    /// Quoted phrase, escapes already resolved.
    Phrase(String),
    /// Field name; the trailing `:` has been consumed.
    Field(String),
    RangeSep,
    LParen,
    RParen,
    Star,
    And,
    Or,
    Not,
    Minus,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexToken {
    pub kind: TokenKind,
    /// Character offset of the token's first character.
    pub pos: usize,
}

pub fn lex(query: &str) -> Result<Vec<LexToken>> {
    let chars: Vec<char> = query.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        match c {
            '(' => {
                tokens.push(LexToken { kind: TokenKind::LParen, pos: start });
                i += 1;
            }
            ')' => {
                tokens.push(LexToken { kind: TokenKind::RParen, pos: start });
                i += 1;
            }
            '*' => {
                tokens.push(LexToken { kind: TokenKind::Star, pos: start });
                i += 1;
            }
            '-' => {
                tokens.push(LexToken { kind: TokenKind::Minus, pos: start });
                i += 1;
            }
            '.' if chars.get(i + 1) == Some(&'.') => {
                tokens.push(LexToken { kind: TokenKind::RangeSep, pos: start });
                i += 2;
            }
            '"' => {
                let (phrase, next) = lex_phrase(query, &chars, i)?;
                tokens.push(LexToken { kind: TokenKind::Phrase(phrase), pos: start });
                i = next;
            }
            _ => {
                let (token, next) = lex_term(&chars, i);
                tokens.push(LexToken { kind: token, pos: start });
                i = next;
            }
        }
    }
    tokens.push(LexToken { kind: TokenKind::Eof, pos: chars.len() });
    Ok(tokens)
}

/// Scan a quoted phrase starting at the opening quote. Supports `\"` and
/// `\\` escapes; anything else after a backslash is kept literally.
fn lex_phrase(query: &str, chars: &[char], open: usize) -> Result<(String, usize)> {
    let mut out = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '"' => return Ok((out, i + 1)),
            '\\' if matches!(chars.get(i + 1), Some('"') | Some('\\')) => {
                out.push(chars[i + 1]);
                i += 2;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(Error::parse(
        query,
        open,
        "unterminated quote",
        "close the quote with a matching '\"'",
    ))
}

/// Scan a term, deciding at the end whether it is a field prefix, an
/// operator keyword, or a plain term.
fn lex_term(chars: &[char], start: usize) -> (TokenKind, usize) {
    let mut i = start;
    let mut text = String::new();
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() || matches!(c, '(' | ')' | '"' | '*') {
            break;
        }
        if c == '.' && chars.get(i + 1) == Some(&'.') {
            break; // range separator, not part of the term
        }
        if c == ':' {
            // A letter-led run immediately followed by ':' is a field
            // prefix; any other ':' is just a term character.
            let letter_led = text.chars().next().map(char::is_alphabetic).unwrap_or(false);
            if letter_led {
                return (TokenKind::Field(text), i + 1);
            }
        }
        text.push(c);
        i += 1;
    }
    let kind = match text.as_str() {
        "AND" => TokenKind::And,
        "OR" => TokenKind::Or,
        "NOT" => TokenKind::Not,
        _ => TokenKind::Term(text),
    };
    (kind, i)
}
