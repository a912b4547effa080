// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Snippet and highlight synthesis.
//!
//! Given a matched document's raw text and the query's terms, find every
//! occurrence (ASCII-case-insensitive, on the raw text), wrap each in a
//! context window, widen window edges to word boundaries, merge overlaps,
//! and keep the densest few. All offsets are character offsets; highlight
//! spans are relative to their snippet so a UI can mark them directly.

use serde::Serialize;

/// Context kept on each side of a hit, in characters.
pub const CONTEXT_CHARS: usize = 40;

/// At most this many snippets per document.
pub const MAX_SNIPPETS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighlightSpan {
    pub start: u32,
    pub end: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub text: String,
    /// 1-based line number of the snippet's first character.
    pub line: u32,
    /// Character offset of the snippet within the document.
    pub start_offset: u32,
    /// Spans in snippet-relative character coordinates.
    pub highlights: Vec<HighlightSpan>,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    start: usize,
    end: usize,
}

#[derive(Debug)]
struct Window {
    start: usize,
    end: usize,
    hits: Vec<Hit>,
}

/// Generate up to [`MAX_SNIPPETS`] snippets for `content`, highlighting
/// `terms` (already lowercased).
pub fn generate<'a>(content: &str, terms: impl IntoIterator<Item = &'a str>) -> Vec<Snippet> {
    let chars: Vec<char> = content.chars().collect();
    let mut hits = Vec::new();
    for term in terms {
        find_occurrences(&chars, term, &mut hits);
    }
    if hits.is_empty() {
        return Vec::new();
    }
    hits.sort_by_key(|h| (h.start, h.end));

    let mut windows = build_windows(&chars, &hits);
    // Density first, then earliest start.
    windows.sort_by(|a, b| b.hits.len().cmp(&a.hits.len()).then(a.start.cmp(&b.start)));
    windows.truncate(MAX_SNIPPETS);

    windows
        .into_iter()
        .map(|w| {
            // The anchor is the window's first hit: its line is what a UI
            // jumps to, even when the context window reaches back across a
            // newline.
            let anchor = w.hits.first().map(|h| h.start).unwrap_or(w.start);
            let line = chars[..anchor].iter().filter(|&&c| c == '\n').count() as u32 + 1;
            Snippet {
                text: chars[w.start..w.end].iter().collect(),
                line,
                start_offset: w.start as u32,
                highlights: w
                    .hits
                    .iter()
                    .map(|h| HighlightSpan {
                        start: (h.start - w.start) as u32,
                        end: (h.end - w.start) as u32,
                    })
                    .collect(),
            }
        })
        .collect()
}

/// All occurrences of `term` in `chars`, ASCII-case-insensitive.
fn find_occurrences(chars: &[char], term: &str, out: &mut Vec<Hit>) {
    let needle: Vec<char> = term.chars().collect();
    if needle.is_empty() || needle.len() > chars.len() {
        return;
    }
    for start in 0..=chars.len() - needle.len() {
        let matched = needle
            .iter()
            .zip(&chars[start..start + needle.len()])
            .all(|(n, c)| n.eq_ignore_ascii_case(c));
        if matched {
            out.push(Hit {
                start,
                end: start + needle.len(),
            });
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Expand each hit to its context window, align edges to word boundaries,
/// then merge overlapping windows (hits sorted by start on entry).
fn build_windows(chars: &[char], hits: &[Hit]) -> Vec<Window> {
    let mut windows: Vec<Window> = Vec::new();
    for &hit in hits {
        let mut start = hit.start.saturating_sub(CONTEXT_CHARS);
        let mut end = (hit.end + CONTEXT_CHARS).min(chars.len());
        // Never cut a word in half: widen until the edge sits between a
        // word char and a non-word char (or the document edge).
        while start > 0 && is_word_char(chars[start]) && is_word_char(chars[start - 1]) {
            start -= 1;
        }
        while end < chars.len() && end > 0 && is_word_char(chars[end - 1]) && is_word_char(chars[end]) {
            end += 1;
        }

        match windows.last_mut() {
            Some(last) if start <= last.end => {
                last.end = last.end.max(end);
                last.hits.push(hit);
            }
            _ => windows.push(Window {
                start,
                end,
                hits: vec![hit],
            }),
        }
    }
    windows
}
