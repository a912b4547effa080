// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Posting lists (`inv` file) and their skip entries.
//!
//! Postings are the heart of the index: for each term, which documents
//! contain it and how often. Doc ids cluster, so they are delta-encoded;
//! every 128th document gets a skip entry so a reader can jump deep into a
//! long list without decoding everything before it.
//!
//! Per-list layout, reachable only through the dictionary's
//! `postingsOffset`: `{docCount varint, skipCount varint, skipCount ×
//! (skipDocId u32 BE, deltaOffset u32 BE), delta-encoded docIds,
//! termFreqs varints}`. The i-th skip entry carries `docIds[(i+1)·128−1]`
//! and the byte offset, within the delta region, at which that document's
//! delta begins.
//!
//! # References
//!
//! - Zobel & Moffat (2006): "Inverted Files for Text Search Engines",
//!   ACM Computing Surveys.
//! - Pugh (1990): "Skip Lists: A Probabilistic Alternative to Balanced
//!   Trees", CACM 33(6).

use std::io::Read;

use crate::codec::write_u32 as write_varint;
use crate::error::{Error, Result};
use crate::segment::file::{read_u32_be, read_varint_u32};

/// A skip entry is emitted after every `SKIP_INTERVAL` documents.
pub const SKIP_INTERVAL: usize = 128;

/// Upper bound on documents in one posting list; a decoded count beyond
/// this is corruption, not data.
pub const MAX_POSTING_DOCS: u32 = 100_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipEntry {
    pub doc_id: u32,
    /// Byte offset of this document's delta within the delta region.
    pub delta_offset: u32,
}

/// A fully decoded posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingList {
    pub doc_ids: Vec<u32>,
    pub term_freqs: Vec<u32>,
    pub skips: Vec<SkipEntry>,
}

/// Encode one posting list into `buf`.
///
/// Doc ids must be strictly ascending and every term frequency at least 1;
/// both are caller contracts, checked here because a violation would write
/// an undecodable or silently wrong list.
pub fn encode_posting_list(doc_ids: &[u32], term_freqs: &[u32], buf: &mut Vec<u8>) -> Result<()> {
    if doc_ids.len() != term_freqs.len() {
        return Err(Error::Validation(format!(
            "posting list arity mismatch: {} doc ids, {} term freqs",
            doc_ids.len(),
            term_freqs.len()
        )));
    }
    write_varint(doc_ids.len() as u32, buf);

    // Delta region built aside so skip entries can record byte offsets
    // into it before it is appended.
    let mut deltas = Vec::with_capacity(doc_ids.len());
    let mut skips: Vec<SkipEntry> = Vec::with_capacity(doc_ids.len() / SKIP_INTERVAL);
    let mut prev = 0u32;
    for (k, &doc_id) in doc_ids.iter().enumerate() {
        if k > 0 && doc_id <= prev {
            return Err(Error::Validation(format!(
                "posting doc ids must be strictly ascending: {} after {}",
                doc_id, prev
            )));
        }
        let delta_start = deltas.len() as u32;
        let delta = if k == 0 { doc_id } else { doc_id - prev };
        write_varint(delta, &mut deltas);
        if (k + 1) % SKIP_INTERVAL == 0 {
            skips.push(SkipEntry {
                doc_id,
                delta_offset: delta_start,
            });
        }
        prev = doc_id;
    }

    write_varint(skips.len() as u32, buf);
    for skip in &skips {
        buf.extend_from_slice(&skip.doc_id.to_be_bytes());
        buf.extend_from_slice(&skip.delta_offset.to_be_bytes());
    }
    buf.extend_from_slice(&deltas);

    for (&tf, &doc_id) in term_freqs.iter().zip(doc_ids) {
        if tf == 0 {
            return Err(Error::Validation(format!(
                "term frequency for doc {} must be at least 1",
                doc_id
            )));
        }
        write_varint(tf, buf);
    }
    Ok(())
}

/// Decode a posting list from a reader positioned at its start.
pub fn read_posting_list(r: &mut (impl Read + ?Sized)) -> Result<PostingList> {
    let doc_count = read_varint_u32(r)?;
    if doc_count > MAX_POSTING_DOCS {
        return Err(Error::Format(format!(
            "posting list claims {} documents (cap {})",
            doc_count, MAX_POSTING_DOCS
        )));
    }
    let doc_count = doc_count as usize;
    let skip_count = read_varint_u32(r)? as usize;
    if skip_count != doc_count / SKIP_INTERVAL {
        return Err(Error::Format(format!(
            "skip count {} inconsistent with doc count {}",
            skip_count, doc_count
        )));
    }

    let mut skips = Vec::with_capacity(skip_count);
    for _ in 0..skip_count {
        let doc_id = read_u32_be(r)?;
        let delta_offset = read_u32_be(r)?;
        skips.push(SkipEntry {
            doc_id,
            delta_offset,
        });
    }

    let mut doc_ids = Vec::with_capacity(doc_count);
    let mut prev = 0u32;
    for k in 0..doc_count {
        let delta = read_varint_u32(r)?;
        let doc_id = if k == 0 {
            delta
        } else {
            if delta == 0 {
                return Err(Error::Format(
                    "zero delta: doc ids not strictly ascending".to_string(),
                ));
            }
            prev.checked_add(delta)
                .ok_or_else(|| Error::Format("doc id delta overflows u32".to_string()))?
        };
        doc_ids.push(doc_id);
        prev = doc_id;
    }

    // Skip entries must agree with what was just decoded.
    for (i, skip) in skips.iter().enumerate() {
        let expect = doc_ids[(i + 1) * SKIP_INTERVAL - 1];
        if skip.doc_id != expect {
            return Err(Error::Format(format!(
                "skip entry {} names doc {} but list holds {}",
                i, skip.doc_id, expect
            )));
        }
    }

    let mut term_freqs = Vec::with_capacity(doc_count);
    for _ in 0..doc_count {
        let tf = read_varint_u32(r)?;
        if tf == 0 {
            return Err(Error::Format("zero term frequency".to_string()));
        }
        term_freqs.push(tf);
    }

    Ok(PostingList {
        doc_ids,
        term_freqs,
        skips,
    })
}
