// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! K-way segment merge.
//!
//! Walks the input dictionaries in lockstep (they are ordered maps, so
//! this is a classic k-way merge on term bytes), concatenates each term's
//! surviving postings in doc-id order, and streams the result through a
//! [`SegmentWriter`]. Tombstoned documents are folded in here: they are
//! simply not re-emitted, which is the only place deleted postings ever
//! physically disappear.
//!
//! A doc id lives in exactly one input segment (each document was flushed
//! once and ids are never reused), so concatenation plus an order check is
//! enough; no positional merging across inputs is needed.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::segment::writer::SegmentWriter;
use crate::segment::{DiskSegment, DocPosting};

/// Merge `inputs` into the segment under construction in `writer`.
/// Returns the number of live documents written.
pub fn merge_segments(inputs: &[Arc<DiskSegment>], writer: &mut SegmentWriter) -> Result<u32> {
    // Tombstones snapshotted once: a delete arriving mid-merge lands in
    // the input's tombstone set and is re-applied to the output by the
    // caller after publication.
    let deletes: Vec<BTreeSet<u32>> = inputs.iter().map(|s| s.deletes()).collect();

    let mut iters: Vec<_> = inputs
        .iter()
        .map(|s| s.dictionary().iter().peekable())
        .collect();

    let mut live_docs = BTreeSet::new();
    loop {
        // Smallest term still pending across all inputs.
        let Some(term) = iters
            .iter_mut()
            .filter_map(|it| it.peek().map(|(t, _)| (*t).clone()))
            .min()
        else {
            break;
        };

        let mut postings: Vec<DocPosting> = Vec::new();
        for (idx, iter) in iters.iter_mut().enumerate() {
            let contributes = matches!(iter.peek(), Some((t, _)) if **t == term);
            if !contributes {
                continue;
            }
            iter.next();
            // Positions carry everything postings do (term_freq is the
            // position count by invariant), so one bulk read per input
            // suffices.
            for (doc_id, positions) in inputs[idx].read_positions(&term)? {
                if deletes[idx].contains(&doc_id) {
                    continue;
                }
                postings.push(DocPosting {
                    doc_id,
                    term_freq: positions.len() as u32,
                    positions,
                });
            }
        }

        if postings.is_empty() {
            continue; // every contributor was tombstoned
        }
        postings.sort_by_key(|p| p.doc_id);
        for pair in postings.windows(2) {
            if pair[0].doc_id == pair[1].doc_id {
                return Err(Error::Format(format!(
                    "doc {} appears in two segments for term {:?}",
                    pair[0].doc_id, term
                )));
            }
        }
        for p in &postings {
            live_docs.insert(p.doc_id);
        }
        writer.add_term(&term, &postings)?;
    }

    debug!(inputs = inputs.len(), live_docs = live_docs.len(), "merged segments");
    Ok(live_docs.len() as u32)
}
