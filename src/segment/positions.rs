// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Per-term position blocks (`pos` file).
//!
//! Phrase queries need to know *where* in a document a term occurs, not
//! just that it does. Each term's block holds, per document, the ordered
//! token positions of that term, delta-encoded. Blocks are reachable only
//! through the dictionary's `positionsOffset`.
//!
//! Layout: `{docCount varint, then per doc: docId varint (absolute, not
//! delta), posCount varint, positions delta+varint}`. Documents appear in
//! ascending docId order, which is what makes the targeted read below able
//! to stop early.

use std::io::Read;

use crate::codec::{write_monotone, write_u32 as write_varint};
use crate::error::{Error, Result};
use crate::segment::file::read_varint_u32;
use crate::segment::postings::MAX_POSTING_DOCS;

/// Encode a positions block for one term.
///
/// `entries` pairs each doc id with that document's ascending positions;
/// doc ids must arrive strictly ascending.
pub fn encode_positions_block(entries: &[(u32, &[u32])], buf: &mut Vec<u8>) -> Result<()> {
    write_varint(entries.len() as u32, buf);
    let mut prev: Option<u32> = None;
    for &(doc_id, positions) in entries {
        if let Some(p) = prev {
            if doc_id <= p {
                return Err(Error::Validation(format!(
                    "position block doc ids must be strictly ascending: {} after {}",
                    doc_id, p
                )));
            }
        }
        if positions.is_empty() {
            return Err(Error::Validation(format!(
                "doc {} has no positions; it should not be in the block",
                doc_id
            )));
        }
        write_varint(doc_id, buf);
        write_varint(positions.len() as u32, buf);
        write_monotone(positions, buf)?;
        prev = Some(doc_id);
    }
    Ok(())
}

/// Bulk read: decode the whole block into `(docId, positions)` pairs.
pub fn read_positions_block(r: &mut (impl Read + ?Sized)) -> Result<Vec<(u32, Vec<u32>)>> {
    let doc_count = read_varint_u32(r)?;
    if doc_count > MAX_POSTING_DOCS {
        return Err(Error::Format(format!(
            "position block claims {} documents (cap {})",
            doc_count, MAX_POSTING_DOCS
        )));
    }
    let mut entries = Vec::with_capacity(doc_count as usize);
    let mut prev: Option<u32> = None;
    for _ in 0..doc_count {
        let doc_id = read_varint_u32(r)?;
        if let Some(p) = prev {
            if doc_id <= p {
                return Err(Error::Format(
                    "position block doc ids not strictly ascending".to_string(),
                ));
            }
        }
        let positions = read_doc_positions(r)?;
        entries.push((doc_id, positions));
        prev = Some(doc_id);
    }
    Ok(entries)
}

/// Targeted read: scan the block for one document, short-circuiting as soon
/// as the scan passes the target id. Returns `None` if the document has no
/// positions for this term.
pub fn find_doc_positions(r: &mut (impl Read + ?Sized), target: u32) -> Result<Option<Vec<u32>>> {
    let doc_count = read_varint_u32(r)?;
    if doc_count > MAX_POSTING_DOCS {
        return Err(Error::Format(format!(
            "position block claims {} documents (cap {})",
            doc_count, MAX_POSTING_DOCS
        )));
    }
    for _ in 0..doc_count {
        let doc_id = read_varint_u32(r)?;
        if doc_id > target {
            return Ok(None);
        }
        if doc_id == target {
            return Ok(Some(read_doc_positions(r)?));
        }
        // Not ours: skip this doc's positions without reconstructing them.
        let pos_count = read_varint_u32(r)?;
        for _ in 0..pos_count {
            read_varint_u32(r)?;
        }
    }
    Ok(None)
}

fn read_doc_positions(r: &mut (impl Read + ?Sized)) -> Result<Vec<u32>> {
    let pos_count = read_varint_u32(r)?;
    let mut positions = Vec::with_capacity(pos_count as usize);
    let mut prev = 0u32;
    for k in 0..pos_count {
        let delta = read_varint_u32(r)?;
        let position = if k == 0 {
            delta
        } else {
            if delta == 0 {
                return Err(Error::Format(
                    "positions within a doc not strictly ascending".to_string(),
                ));
            }
            prev.checked_add(delta)
                .ok_or_else(|| Error::Format("position delta overflows u32".to_string()))?
        };
        positions.push(position);
        prev = position;
    }
    Ok(positions)
}
