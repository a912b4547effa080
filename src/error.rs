// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Crate-wide error taxonomy.
//!
//! Five kinds, and the distinction matters: a `Format` error means bytes on
//! disk cannot be trusted and the affected file must not be used; an `Io`
//! error means the operation might succeed on retry; a `QueryParse` error is
//! user input and never fatal; a `Validation` error is a caller bug and must
//! not be retried; `ConcurrentModification` means a manifest writer lost a
//! race after exhausting its retries.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bytes on disk violate the segment format: bad magic, unsupported
    /// version, CRC mismatch, malformed varint, offset out of range, or a
    /// term-ordering violation.
    #[error("format error: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Lexer or parser rejection. Carries enough context for the CLI to
    /// print a caret under the offending character.
    #[error("{0}")]
    QueryParse(ParseError),

    /// The caller violated an input contract (non-monotone sequence handed
    /// to the delta encoder, oversized query, negative term frequency).
    #[error("validation error: {0}")]
    Validation(String),

    /// The manifest changed under a writer and retries were exhausted.
    #[error("manifest changed concurrently ({retries} retries exhausted)")]
    ConcurrentModification { retries: u32 },
}

impl Error {
    /// Format error tagged with the file it came from.
    pub fn format_in(path: &std::path::Path, msg: impl fmt::Display) -> Self {
        Error::Format(format!("{}: {}", path.display(), msg))
    }

    pub fn parse(query: &str, position: usize, message: impl Into<String>, hint: impl Into<String>) -> Self {
        Error::QueryParse(ParseError {
            query: query.to_string(),
            position,
            message: message.into(),
            hint: hint.into(),
        })
    }
}

/// A query rejection with caret position and a remediation hint.
///
/// `position` is a character offset into `query`, pointing at the first
/// character the lexer or parser could not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub query: String,
    pub position: usize,
    pub message: String,
    pub hint: String,
}

impl ParseError {
    /// Render the query with a caret under the offending position, the way
    /// the CLI shows it:
    ///
    /// ```text
    /// parse error at 9: unterminated quote
    ///   "quick brown
    ///            ^
    /// hint: close the quote with a matching '"'
    /// ```
    pub fn render(&self) -> String {
        let caret = " ".repeat(self.position);
        format!(
            "parse error at {}: {}\n  {}\n  {}^\nhint: {}",
            self.position, self.message, self.query, caret, self.hint
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at {}: {} (hint: {})",
            self.position, self.message, self.hint
        )
    }
}

/// Where a quarantined file ends up: `<name>.quarantine` next to the
/// original, so a human can inspect it while the segment is declared
/// unhealthy.
pub fn quarantine_path(path: &std::path::Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".quarantine");
    path.with_file_name(name)
}
