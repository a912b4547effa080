// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Mixed-script tokenization.
//!
//! Latin-ish text wants word tokens; CJK text has no word boundaries to
//! split on, so it gets character bigrams — the standard trick that makes
//! substring search work without a dictionary-based segmenter. The input is
//! partitioned into maximal runs of CJK vs non-CJK code points and each run
//! is dispatched to the matching strategy. One position counter spans the
//! whole document, so phrase queries can cross run boundaries.
//!
//! Offsets are measured in characters of the original input (not bytes),
//! which is what the snippet generator works in.

/// A single emitted token.
///
/// `position` is the token's ordinal within the document; `start`/`end` are
/// character offsets into the input, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
    pub start: u32,
    pub end: u32,
}

/// Fixed English stop list (applied only when enabled).
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can",
    "did", "do", "does", "for", "from", "had", "has", "have", "he", "her",
    "his", "how", "if", "in", "into", "is", "it", "its", "no", "not", "of",
    "on", "or", "she", "so", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "we", "were", "will", "with", "you",
];

/// Han, Hiragana, Katakana, and Hangul code points join the CJK run;
/// everything else goes to word tokenization.
pub fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        // Han: unified ideographs, extension A, compatibility ideographs,
        // and the supplementary-plane extensions.
        0x4E00..=0x9FFF
        | 0x3400..=0x4DBF
        | 0xF900..=0xFAFF
        | 0x20000..=0x2EBEF
        // Hiragana
        | 0x3040..=0x309F
        // Katakana + phonetic extensions
        | 0x30A0..=0x30FF
        | 0x31F0..=0x31FF
        // Hangul syllables + jamo + compatibility jamo
        | 0xAC00..=0xD7AF
        | 0x1100..=0x11FF
        | 0x3130..=0x318F)
}

/// Composite tokenizer over mixed Latin + CJK text.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    stop_words: bool,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer { stop_words: false }
    }
}

impl Tokenizer {
    pub fn new(stop_words: bool) -> Self {
        Tokenizer { stop_words }
    }

    /// Tokenize `text`, emitting tokens with a globally monotone position
    /// and monotone non-decreasing character offsets.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::new();
        let mut position = 0u32;

        let mut run_start = 0usize;
        while run_start < chars.len() {
            let cjk = is_cjk(chars[run_start]);
            let mut run_end = run_start + 1;
            while run_end < chars.len() && is_cjk(chars[run_end]) == cjk {
                run_end += 1;
            }
            if cjk {
                self.emit_cjk_run(&chars, run_start, run_end, &mut position, &mut tokens);
            } else {
                self.emit_word_run(&chars, run_start, run_end, &mut position, &mut tokens);
            }
            run_start = run_end;
        }
        tokens
    }

    /// Non-CJK run: split on non-alphanumeric, lowercase, drop tokens of a
    /// single character, drop stop words when enabled.
    fn emit_word_run(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        position: &mut u32,
        out: &mut Vec<Token>,
    ) {
        let mut i = start;
        while i < end {
            if !chars[i].is_alphanumeric() {
                i += 1;
                continue;
            }
            let word_start = i;
            while i < end && chars[i].is_alphanumeric() {
                i += 1;
            }
            if i - word_start <= 1 {
                continue;
            }
            let term: String = chars[word_start..i]
                .iter()
                .flat_map(|c| c.to_lowercase())
                .collect();
            if self.stop_words && STOP_WORDS.binary_search(&term.as_str()).is_ok() {
                continue;
            }
            out.push(Token {
                term,
                position: *position,
                start: word_start as u32,
                end: i as u32,
            });
            *position += 1;
        }
    }

    /// CJK run: every two-character sliding window; a lone character if the
    /// run has length 1.
    fn emit_cjk_run(
        &self,
        chars: &[char],
        start: usize,
        end: usize,
        position: &mut u32,
        out: &mut Vec<Token>,
    ) {
        if end - start == 1 {
            out.push(Token {
                term: chars[start].to_string(),
                position: *position,
                start: start as u32,
                end: end as u32,
            });
            *position += 1;
            return;
        }
        for i in start..end - 1 {
            let term: String = chars[i..i + 2].iter().collect();
            out.push(Token {
                term,
                position: *position,
                start: i as u32,
                end: (i + 2) as u32,
            });
            *position += 1;
        }
    }
}
