// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Query DSL: AST types, the pre-parse filename rewrite, and the public
//! parse entry points.
//!
//! The AST is a tagged sum; the sort directive lives next to the root in
//! [`ParsedQuery`] rather than inside it, because `sort:` is a query-level
//! instruction, not a node a traversal should ever visit.

pub mod eval;
pub mod lexer;
pub mod parser;

use std::collections::BTreeSet;

use crate::error::Result;

/// Maximum accepted query length in bytes.
pub const MAX_QUERY_BYTES: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

/// Fields a `field:value` expression may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Path,
    Ext,
    Filename,
    Type,
    Size,
    Mtime,
}

impl FieldKind {
    /// `name` is accepted as an alias of `filename`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "path" => Some(FieldKind::Path),
            "ext" => Some(FieldKind::Ext),
            "filename" | "name" => Some(FieldKind::Filename),
            "type" => Some(FieldKind::Type),
            "size" => Some(FieldKind::Size),
            "mtime" => Some(FieldKind::Mtime),
            _ => None,
        }
    }

    /// Only `size` and `mtime` accept `low..high` ranges.
    pub fn supports_range(self) -> bool {
        matches!(self, FieldKind::Size | FieldKind::Mtime)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Score,
    Mtime,
    Size,
}

impl SortKey {
    /// Unknown sort fields fall back to score ordering.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "mtime" => SortKey::Mtime,
            "size" => SortKey::Size,
            _ => SortKey::Score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Term(String),
    Prefix(String),
    Phrase(Vec<String>),
    Bool {
        op: BoolOp,
        left: Box<QueryNode>,
        right: Box<QueryNode>,
    },
    Not(Box<QueryNode>),
    Field {
        field: FieldKind,
        value: String,
    },
    Range {
        field: FieldKind,
        low: String,
        high: String,
    },
}

/// A parsed query: the AST plus the optional top-level sort directive.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub root: QueryNode,
    pub sort: Option<SortKey>,
}

/// Parse with the bare-filename convenience rewrite enabled.
pub fn parse(query: &str) -> Result<ParsedQuery> {
    parse_with_options(query, true)
}

/// Parse, optionally rewriting a bare dotted token (`readme.md`) to
/// `filename:"readme.md"` first. Tests disable the rewrite to exercise the
/// grammar directly.
pub fn parse_with_options(query: &str, rewrite_bare_filename: bool) -> Result<ParsedQuery> {
    if rewrite_bare_filename {
        if let Some(rewritten) = rewrite_filename_lookup(query) {
            return parser::parse_query(&rewritten);
        }
    }
    parser::parse_query(query)
}

/// A whole query consisting of one dotted token with no whitespace or
/// metacharacters is almost always a file-name lookup; rewrite it into one.
fn rewrite_filename_lookup(query: &str) -> Option<String> {
    let token = query.trim();
    if token.is_empty() || !token.contains('.') || token.contains("..") {
        return None;
    }
    if token.starts_with('-') || token.starts_with('.') {
        return None;
    }
    let clean = token
        .chars()
        .all(|c| !c.is_whitespace() && !matches!(c, ':' | '"' | '(' | ')' | '*'));
    if !clean {
        return None;
    }
    Some(format!("filename:\"{}\"", token))
}

/// Lowercased terms the snippet generator should highlight: positive
/// term/prefix/phrase words. Negated subtrees are excluded — their terms
/// are exactly what matched documents do *not* contain.
pub fn highlight_terms(node: &QueryNode) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_highlight_terms(node, &mut out);
    out
}

fn collect_highlight_terms(node: &QueryNode, out: &mut BTreeSet<String>) {
    match node {
        QueryNode::Term(t) | QueryNode::Prefix(t) => {
            out.insert(t.clone());
        }
        QueryNode::Phrase(terms) => {
            out.extend(terms.iter().cloned());
        }
        QueryNode::Bool { left, right, .. } => {
            collect_highlight_terms(left, out);
            collect_highlight_terms(right, out);
        }
        QueryNode::Not(_) | QueryNode::Field { .. } | QueryNode::Range { .. } => {}
    }
}
