// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The in-memory segment.
//!
//! Ingest workers append concurrently; a flush must observe no partial
//! document. The lock split that buys both: appends hold the *read* side
//! of an outer `RwLock` (so any number of workers run at once) while the
//! term map itself is a sharded `DashMap` that serializes same-term
//! appends internally; flush takes the *write* side and therefore waits
//! for every in-flight append and excludes new ones.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::segment::DocPosting;
use crate::tokenizer::Token;

/// Flush once this many documents accumulate.
pub const FLUSH_DOC_THRESHOLD: u32 = 10_000;

/// Flush once the postings estimate reaches 64 MiB.
pub const FLUSH_BYTES_THRESHOLD: usize = 64 * 1024 * 1024;

pub struct MemSegment {
    gate: RwLock<()>,
    terms: DashMap<String, Vec<DocPosting>>,
    doc_count: AtomicU32,
    bytes_estimate: AtomicUsize,
}

impl Default for MemSegment {
    fn default() -> Self {
        Self::new()
    }
}

impl MemSegment {
    pub fn new() -> Self {
        MemSegment {
            gate: RwLock::new(()),
            terms: DashMap::new(),
            doc_count: AtomicU32::new(0),
            bytes_estimate: AtomicUsize::new(0),
        }
    }

    /// Append one document's tokens. Token positions are already globally
    /// monotone within the document, so each term's position list arrives
    /// sorted.
    pub fn add_document(&self, doc_id: u32, tokens: &[Token]) {
        let _append = self.gate.read();

        let mut by_term: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
        for token in tokens {
            by_term.entry(&token.term).or_default().push(token.position);
        }

        let mut added_bytes = 0usize;
        for (term, positions) in by_term {
            added_bytes += term.len() + 16 + 4 * positions.len();
            self.terms
                .entry(term.to_string())
                .or_default()
                .push(DocPosting {
                    doc_id,
                    term_freq: positions.len() as u32,
                    positions,
                });
        }
        self.doc_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_estimate.fetch_add(added_bytes, Ordering::Relaxed);
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.doc_count() == 0
    }

    pub fn should_flush(&self) -> bool {
        self.doc_count() >= FLUSH_DOC_THRESHOLD
            || self.bytes_estimate.load(Ordering::Relaxed) >= FLUSH_BYTES_THRESHOLD
    }

    /// Take everything accumulated so far, sorted for the segment writer:
    /// terms lex-ascending, postings per term ascending by doc id, with
    /// `exclude`d docs (deleted before they ever hit disk) filtered out.
    ///
    /// Runs under the write lock, so no concurrent append can observe or
    /// produce a partial state.
    pub fn drain(
        &self,
        exclude: &std::collections::BTreeSet<u32>,
    ) -> BTreeMap<String, Vec<DocPosting>> {
        let _flush = self.gate.write();

        let keys: Vec<String> = self.terms.iter().map(|e| e.key().clone()).collect();
        let mut out = BTreeMap::new();
        for key in keys {
            if let Some((term, mut postings)) = self.terms.remove(&key) {
                postings.sort_by_key(|p| p.doc_id);
                postings.retain(|p| !exclude.contains(&p.doc_id));
                if !postings.is_empty() {
                    out.insert(term, postings);
                }
            }
        }
        self.doc_count.store(0, Ordering::Relaxed);
        self.bytes_estimate.store(0, Ordering::Relaxed);
        out
    }
}
