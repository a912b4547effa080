// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! BM25 scoring.
//!
//! Standard Okapi BM25 with the usual smoothing:
//!
//! ```text
//! score(d, t) = idf(t) · tf·(k1+1) / (tf + k1·(1 − b + b·|d|/avgDL))
//! idf(t)      = ln((N − df + 0.5) / (df + 0.5) + 1)
//! ```
//!
//! Statistics are live-doc-aware and computed once per query, before
//! evaluation, so every segment scores against the same N, avgDL, and df.
//! The clamps below (df ≤ N, non-positive N/avgDL → 1.0) keep the math
//! NaN-free when the index is empty or statistics race a deletion.

use std::collections::HashMap;

pub const K1: f64 = 1.2;
pub const B: f64 = 0.75;

/// Corpus-level statistics for one query evaluation.
#[derive(Debug, Clone)]
pub struct Bm25Stats {
    n: f64,
    avg_doc_len: f64,
    doc_freqs: HashMap<String, u32>,
}

impl Bm25Stats {
    pub fn new(total_docs: u32, avg_doc_len: f64, doc_freqs: HashMap<String, u32>) -> Self {
        Bm25Stats {
            n: if total_docs == 0 { 1.0 } else { f64::from(total_docs) },
            avg_doc_len: if avg_doc_len <= 0.0 { 1.0 } else { avg_doc_len },
            doc_freqs,
        }
    }

    pub fn idf(&self, term: &str) -> f64 {
        let df = f64::from(self.doc_freqs.get(term).copied().unwrap_or(0)).min(self.n);
        ((self.n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Score one (document, term) pair. `doc_len` is the document's token
    /// count as recorded at ingest.
    pub fn score(&self, term: &str, term_freq: u32, doc_len: u32) -> f64 {
        let tf = f64::from(term_freq);
        let norm = K1 * (1.0 - B + B * f64::from(doc_len) / self.avg_doc_len);
        self.idf(term) * (tf * (K1 + 1.0)) / (tf + norm)
    }
}
