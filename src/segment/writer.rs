// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Streaming segment writer.
//!
//! Accepts terms in ascending order (a flush hands them over pre-sorted,
//! a merge produces them in merge order) and streams each term's posting
//! list and positions block to the `inv` and `pos` files while the
//! dictionary accumulates in memory. `finish` seals all three files with
//! their CRC footers, fsyncs them, and writes `meta.json` plus an empty
//! tombstone file.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::{Error, Result};
use crate::segment::checksum::ChecksumWriter;
use crate::segment::dict::DictWriter;
use crate::segment::file::FORMAT_VERSION;
use crate::segment::positions::encode_positions_block;
use crate::segment::postings::encode_posting_list;
use crate::segment::{
    write_del_file, write_meta, DocPosting, SegmentMeta, SegmentStatus, DEL_FILE, DICT_FILE,
    INV_FILE, INV_MAGIC, POS_FILE, POS_MAGIC,
};

/// One of the two streamed section files (`inv`, `pos`).
struct SectionWriter {
    path: PathBuf,
    w: ChecksumWriter<BufWriter<File>>,
}

impl SectionWriter {
    fn create(path: PathBuf, magic: u32) -> Result<Self> {
        let file = File::create(&path)?;
        let mut w = ChecksumWriter::new(BufWriter::new(file));
        w.write_all(&magic.to_be_bytes())?;
        w.write_all(&FORMAT_VERSION.to_be_bytes())?;
        Ok(SectionWriter { path, w })
    }

    /// Append a block, returning the absolute offset it starts at.
    fn append(&mut self, block: &[u8]) -> Result<u64> {
        let offset = self.w.position();
        self.w.write_all(block)?;
        Ok(offset)
    }

    /// Seal with the CRC footer, flush, fsync. Returns total file size.
    fn finish(self) -> Result<u64> {
        let (mut inner, total) = self.w.finish()?;
        inner.flush()?;
        inner.get_ref().sync_all()?;
        Ok(total)
    }
}

/// Writes one complete segment into `dir`.
pub struct SegmentWriter {
    dir: PathBuf,
    dict: DictWriter,
    inv: SectionWriter,
    pos: SectionWriter,
    term_count: u32,
    inv_block: Vec<u8>,
    pos_block: Vec<u8>,
}

impl SegmentWriter {
    pub fn create(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(SegmentWriter {
            dir: dir.to_path_buf(),
            dict: DictWriter::new(),
            inv: SectionWriter::create(dir.join(INV_FILE), INV_MAGIC)?,
            pos: SectionWriter::create(dir.join(POS_FILE), POS_MAGIC)?,
            term_count: 0,
            inv_block: Vec::new(),
            pos_block: Vec::new(),
        })
    }

    /// Add one term with its postings, sorted ascending by doc id.
    pub fn add_term(&mut self, term: &str, postings: &[DocPosting]) -> Result<()> {
        if postings.is_empty() {
            return Err(Error::Validation(format!(
                "term {:?} has no postings",
                term
            )));
        }
        let mut doc_ids = Vec::with_capacity(postings.len());
        let mut term_freqs = Vec::with_capacity(postings.len());
        let mut position_entries: Vec<(u32, &[u32])> = Vec::with_capacity(postings.len());
        for p in postings {
            if p.term_freq as usize != p.positions.len() {
                return Err(Error::Validation(format!(
                    "doc {} of term {:?}: term_freq {} but {} positions",
                    p.doc_id,
                    term,
                    p.term_freq,
                    p.positions.len()
                )));
            }
            doc_ids.push(p.doc_id);
            term_freqs.push(p.term_freq);
            position_entries.push((p.doc_id, p.positions.as_slice()));
        }

        self.inv_block.clear();
        encode_posting_list(&doc_ids, &term_freqs, &mut self.inv_block)?;
        let postings_offset = self.inv.append(&self.inv_block)?;

        self.pos_block.clear();
        encode_positions_block(&position_entries, &mut self.pos_block)?;
        let positions_offset = self.pos.append(&self.pos_block)?;

        self.dict
            .push(term, postings.len() as u32, postings_offset, positions_offset)?;
        self.term_count += 1;
        Ok(())
    }

    /// Seal the segment: CRC footers, fsync, `meta.json`, empty `del`.
    pub fn finish(self, segment_id: u64, level: u32, doc_count: u32) -> Result<SegmentMeta> {
        let inv_bytes = self.inv.finish()?;
        let pos_bytes = self.pos.finish()?;
        let dict_bytes = self.dict.finish(&self.dir.join(DICT_FILE))?;

        write_del_file(&self.dir.join(DEL_FILE), &Default::default())?;

        let meta = SegmentMeta {
            segment_id,
            doc_count,
            term_count: self.term_count,
            size_bytes: inv_bytes + pos_bytes + dict_bytes,
            status: SegmentStatus::Active,
            level,
            create_time: Utc::now(),
        };
        write_meta(&self.dir, &meta)?;
        Ok(meta)
    }
}
