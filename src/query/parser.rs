// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Recursive-descent query parser.
//!
//! Grammar (binary operators left-associative, NOT binds tightest, then
//! AND — explicit or implied by adjacency — then OR):
//!
//! ```text
//! query      = or_expr [ 'sort' ':' field_name ]
//! or_expr    = and_expr { 'OR' and_expr }
//! and_expr   = unary { ('AND' | implicit) unary }
//! unary      = [ 'NOT' | '-' ] primary
//! primary    = '(' or_expr ')' | field_expr | phrase | prefix | term
//! field_expr = FIELD ':' ( value '..' value | value )
//! prefix     = TERM '*'
//! ```
//!
//! Terms and phrases are run through the index tokenizer here, so a query
//! sees exactly the terms the index holds: `readme.md` becomes the phrase
//! `readme md`, CJK input becomes bigrams.

use crate::error::{Error, Result};
use crate::query::lexer::{lex, LexToken, TokenKind};
use crate::query::{BoolOp, FieldKind, ParsedQuery, QueryNode, SortKey};
use crate::tokenizer::Tokenizer;

pub fn parse_query(query: &str) -> Result<ParsedQuery> {
    let tokens = lex(query)?;
    let mut parser = Parser {
        query,
        tokens,
        pos: 0,
        tokenizer: Tokenizer::new(false),
    };
    let root = parser.or_expr()?;
    let sort = parser.sort_directive()?;
    parser.expect_eof()?;
    Ok(ParsedQuery { root, sort })
}

struct Parser<'a> {
    query: &'a str,
    tokens: Vec<LexToken>,
    pos: usize,
    tokenizer: Tokenizer,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &LexToken {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> LexToken {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, pos: usize, message: &str, hint: &str) -> Error {
        Error::parse(self.query, pos, message, hint)
    }

    fn or_expr(&mut self) -> Result<QueryNode> {
        let mut left = self.and_expr()?;
        while matches!(self.peek().kind, TokenKind::Or) {
            self.advance();
            let right = self.and_expr()?;
            left = QueryNode::Bool {
                op: BoolOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<QueryNode> {
        let mut left = self.unary()?;
        loop {
            let explicit = matches!(self.peek().kind, TokenKind::And);
            if explicit {
                self.advance();
            } else if !self.starts_unary() {
                break;
            }
            let right = self.unary()?;
            left = QueryNode::Bool {
                op: BoolOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// Does the current token open a unary expression? `sort:` does not —
    /// it terminates the expression so the tail directive can claim it.
    fn starts_unary(&self) -> bool {
        match &self.peek().kind {
            TokenKind::Term(_)
            | TokenKind::Phrase(_)
            | TokenKind::LParen
            | TokenKind::Not
            | TokenKind::Minus => true,
            TokenKind::Field(name) => name != "sort",
            _ => false,
        }
    }

    fn unary(&mut self) -> Result<QueryNode> {
        if matches!(self.peek().kind, TokenKind::Not | TokenKind::Minus) {
            self.advance();
            let child = self.primary()?;
            return Ok(QueryNode::Not(Box::new(child)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<QueryNode> {
        let token = self.advance();
        match token.kind {
            TokenKind::LParen => {
                let inner = self.or_expr()?;
                match self.advance() {
                    LexToken { kind: TokenKind::RParen, .. } => Ok(inner),
                    other => Err(self.error(
                        other.pos,
                        "expected ')'",
                        "close the parenthesized group",
                    )),
                }
            }
            TokenKind::Phrase(text) => self.phrase_node(&text, token.pos),
            TokenKind::Field(name) if name == "sort" => Err(self.error(
                token.pos,
                "sort: is only allowed at the end of the query",
                "move the sort directive after the last clause",
            )),
            TokenKind::Field(name) => self.field_expr(&name, token.pos),
            TokenKind::Term(text) => {
                if matches!(self.peek().kind, TokenKind::Star) {
                    self.advance();
                    return Ok(QueryNode::Prefix(text.to_lowercase()));
                }
                self.term_node(&text, token.pos)
            }
            other => Err(self.error(
                token.pos,
                &format!("expected a term, got {}", describe(&other)),
                "queries are terms, \"phrases\", field:value pairs, and (groups)",
            )),
        }
    }

    /// A bare term is tokenized like document text, so dotted or mixed
    /// input turns into the phrase the index actually contains.
    fn term_node(&mut self, text: &str, pos: usize) -> Result<QueryNode> {
        let mut terms: Vec<String> = self
            .tokenizer
            .tokenize(text)
            .into_iter()
            .map(|t| t.term)
            .collect();
        match terms.len() {
            0 => Err(self.error(
                pos,
                "term contains no searchable characters",
                "single characters and punctuation are not indexed",
            )),
            1 => Ok(QueryNode::Term(terms.pop().unwrap())),
            _ => Ok(QueryNode::Phrase(terms)),
        }
    }

    fn phrase_node(&mut self, text: &str, pos: usize) -> Result<QueryNode> {
        let terms: Vec<String> = self
            .tokenizer
            .tokenize(text)
            .into_iter()
            .map(|t| t.term)
            .collect();
        if terms.is_empty() {
            return Err(self.error(
                pos,
                "phrase contains no searchable terms",
                "single characters and punctuation are not indexed",
            ));
        }
        Ok(QueryNode::Phrase(terms))
    }

    fn field_expr(&mut self, name: &str, pos: usize) -> Result<QueryNode> {
        let Some(field) = FieldKind::parse(name) else {
            return Err(self.error(
                pos,
                &format!("unrecognized field '{}'", name),
                "known fields: path, ext, filename, name, type, size, mtime",
            ));
        };
        let low = self.field_value(name)?;
        if !matches!(self.peek().kind, TokenKind::RangeSep) {
            return Ok(QueryNode::Field { field, value: low });
        }
        let sep = self.advance();
        if !field.supports_range() {
            return Err(self.error(
                sep.pos,
                &format!("field '{}' does not accept ranges", name),
                "only size and mtime accept low..high ranges",
            ));
        }
        let high = self.field_value(name)?;
        Ok(QueryNode::Range { field, low, high })
    }

    fn field_value(&mut self, name: &str) -> Result<String> {
        let token = self.advance();
        match token.kind {
            TokenKind::Term(text) => Ok(text),
            TokenKind::Phrase(text) => Ok(text),
            other => Err(self.error(
                token.pos,
                &format!("field '{}' needs a value, got {}", name, describe(&other)),
                "write field:value or field:\"quoted value\"",
            )),
        }
    }

    /// The optional tail directive: `sort ':' field_name`. Unknown fields
    /// fall back to score ordering.
    fn sort_directive(&mut self) -> Result<Option<SortKey>> {
        let is_sort = matches!(&self.peek().kind, TokenKind::Field(name) if name == "sort");
        if !is_sort {
            return Ok(None);
        }
        self.advance();
        let token = self.advance();
        match token.kind {
            TokenKind::Term(text) => Ok(Some(SortKey::parse(&text))),
            other => Err(self.error(
                token.pos,
                &format!("sort: needs a field name, got {}", describe(&other)),
                "write sort:mtime or sort:size",
            )),
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        let token = self.peek();
        if matches!(token.kind, TokenKind::Eof) {
            return Ok(());
        }
        if matches!(&token.kind, TokenKind::Field(name) if name == "sort") {
            return Err(self.error(
                token.pos,
                "sort: may appear at most once",
                "keep a single sort directive at the end of the query",
            ));
        }
        Err(self.error(
            token.pos,
            &format!("unexpected {} after end of query", describe(&token.kind)),
            "check operator placement",
        ))
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Term(t) => format!("term '{}'", t),
        TokenKind::Phrase(_) => "a phrase".to_string(),
        TokenKind::Field(f) => format!("field '{}'", f),
        TokenKind::RangeSep => "'..'".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Star => "'*'".to_string(),
        TokenKind::And => "'AND'".to_string(),
        TokenKind::Or => "'OR'".to_string(),
        TokenKind::Not => "'NOT'".to_string(),
        TokenKind::Minus => "'-'".to_string(),
        TokenKind::Eof => "end of query".to_string(),
    }
}
