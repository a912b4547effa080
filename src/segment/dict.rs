// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Segment dictionary (`dict` file).
//!
//! Maps each term to its document frequency and the offsets of its posting
//! list and positions block. Terms are stored strictly ascending by byte
//! order, which the reader re-checks, and the whole dictionary is loaded
//! into an ordered map at open — prefix queries become a range scan.
//!
//! Layout: header `{magic u32 BE, version u16 BE, termCount u32 BE}` (the
//! count is patched at close, before the CRC is computed), then one entry
//! per term `{termLen varint, termBytes, docFreq varint, postingsOffset
//! u64 BE, positionsOffset u64 BE}`, then the CRC-32 footer.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::codec::{read_u32 as varint_u32, write_u32 as write_varint};
use crate::error::{Error, Result};
use crate::segment::checksum::{append_footer, verify_footer};
use crate::segment::file::FORMAT_VERSION;

/// Magic bytes `LSDI`.
pub const DICT_MAGIC: u32 = 0x4C53_4449;

/// Fixed header size: magic + version + term count.
const DICT_HEADER_LEN: usize = 10;

/// One dictionary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermEntry {
    pub doc_freq: u32,
    pub postings_offset: u64,
    pub positions_offset: u64,
}

// ============================================================================
// WRITER
// ============================================================================

/// Builds the dictionary in memory so `termCount` can be patched at close.
/// Dictionaries are small next to postings; buffering them is cheap.
pub struct DictWriter {
    buf: Vec<u8>,
    count: u32,
    last_term: Option<String>,
}

impl DictWriter {
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(64 * 1024);
        buf.extend_from_slice(&DICT_MAGIC.to_be_bytes());
        buf.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes()); // termCount, patched in finish
        DictWriter {
            buf,
            count: 0,
            last_term: None,
        }
    }

    /// Append one entry. Terms must arrive strictly ascending.
    pub fn push(
        &mut self,
        term: &str,
        doc_freq: u32,
        postings_offset: u64,
        positions_offset: u64,
    ) -> Result<()> {
        if let Some(last) = &self.last_term {
            if term.as_bytes() <= last.as_bytes() {
                return Err(Error::Validation(format!(
                    "dictionary terms must be strictly ascending: {:?} after {:?}",
                    term, last
                )));
            }
        }
        write_varint(term.len() as u32, &mut self.buf);
        self.buf.extend_from_slice(term.as_bytes());
        write_varint(doc_freq, &mut self.buf);
        self.buf.extend_from_slice(&postings_offset.to_be_bytes());
        self.buf.extend_from_slice(&positions_offset.to_be_bytes());
        self.count += 1;
        self.last_term = Some(term.to_string());
        Ok(())
    }

    /// Patch the count, append the CRC footer, write and fsync the file.
    pub fn finish(mut self, path: &Path) -> Result<u64> {
        self.buf[6..10].copy_from_slice(&self.count.to_be_bytes());
        append_footer(&mut self.buf);
        let mut f = fs::File::create(path)?;
        f.write_all(&self.buf)?;
        f.sync_all()?;
        Ok(self.buf.len() as u64)
    }
}

impl Default for DictWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// READER
// ============================================================================

/// The whole dictionary of one segment, held in an ordered map.
#[derive(Debug)]
pub struct Dictionary {
    terms: BTreeMap<String, TermEntry>,
}

impl Dictionary {
    /// Load and fully validate the dictionary file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let body = verify_footer(&bytes).map_err(|msg| Error::format_in(path, msg))?;
        if body.len() < DICT_HEADER_LEN {
            return Err(Error::format_in(path, "file too short for header"));
        }
        let magic = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
        if magic != DICT_MAGIC {
            return Err(Error::format_in(
                path,
                format!("magic mismatch: expected {:08x}, found {:08x}", DICT_MAGIC, magic),
            ));
        }
        let version = u16::from_be_bytes([body[4], body[5]]);
        if version != FORMAT_VERSION {
            return Err(Error::format_in(
                path,
                format!("unsupported format version {}", version),
            ));
        }
        let count = u32::from_be_bytes([body[6], body[7], body[8], body[9]]) as usize;

        let mut terms = BTreeMap::new();
        let mut pos = DICT_HEADER_LEN;
        let mut last_term: Option<String> = None;
        for _ in 0..count {
            let (term_len, consumed) =
                varint_u32(&body[pos..]).map_err(|e| Error::format_in(path, e))?;
            pos += consumed;
            let term_len = term_len as usize;
            if pos + term_len > body.len() {
                return Err(Error::format_in(path, "truncated term bytes"));
            }
            let term = std::str::from_utf8(&body[pos..pos + term_len])
                .map_err(|_| Error::format_in(path, "term is not valid UTF-8"))?
                .to_string();
            pos += term_len;
            if let Some(last) = &last_term {
                if term.as_bytes() <= last.as_bytes() {
                    return Err(Error::format_in(
                        path,
                        format!("term ordering violated: {:?} after {:?}", term, last),
                    ));
                }
            }
            let (doc_freq, consumed) =
                varint_u32(&body[pos..]).map_err(|e| Error::format_in(path, e))?;
            pos += consumed;
            if pos + 16 > body.len() {
                return Err(Error::format_in(path, "truncated offsets"));
            }
            let postings_offset = u64::from_be_bytes(body[pos..pos + 8].try_into().unwrap());
            let positions_offset =
                u64::from_be_bytes(body[pos + 8..pos + 16].try_into().unwrap());
            pos += 16;
            last_term = Some(term.clone());
            terms.insert(
                term,
                TermEntry {
                    doc_freq,
                    postings_offset,
                    positions_offset,
                },
            );
        }
        if pos != body.len() {
            return Err(Error::format_in(
                path,
                format!("{} trailing bytes after last entry", body.len() - pos),
            ));
        }
        Ok(Dictionary { terms })
    }

    pub fn get(&self, term: &str) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// All terms whose bytes start with `prefix`, ascending (a range scan,
    /// not a full iteration).
    pub fn prefix_scan<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a TermEntry)> + 'a {
        self.terms
            .range(prefix.to_string()..)
            .take_while(move |(term, _)| term.starts_with(prefix))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TermEntry)> {
        self.terms.iter()
    }
}
