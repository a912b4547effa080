// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Immutable on-disk segments.
//!
//! A segment is three checksum-guarded files (`dict`, `inv`, `pos`), a JSON
//! metadata descriptor, and a tombstone file (`del`). Segments are created
//! by a mem-segment flush or by a merge, never rewritten, and destroyed
//! only after a newer segment set has been published and every query
//! snapshot holding them has been dropped — which is exactly what
//! `Arc<DiskSegment>` plus the `Drop` impl below expresses.

pub mod checksum;
pub mod dict;
pub mod file;
pub mod mem;
pub mod merge;
pub mod positions;
pub mod postings;
pub mod writer;

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::codec::{read_monotone, read_u32 as varint_u32, write_monotone, write_u32 as write_varint};
use crate::error::{Error, Result};
use self::dict::Dictionary;
use self::file::SegmentFile;
use self::positions::{find_doc_positions, read_positions_block};
use self::postings::{read_posting_list, PostingList};

/// Magic bytes `LSPI` for the postings file.
pub const INV_MAGIC: u32 = 0x4C53_5049;

/// Magic bytes `LSPS` for the positions file.
pub const POS_MAGIC: u32 = 0x4C53_5053;

pub const DICT_FILE: &str = "dict";
pub const INV_FILE: &str = "inv";
pub const POS_FILE: &str = "pos";
pub const META_FILE: &str = "meta.json";
pub const DEL_FILE: &str = "del";

pub fn segment_dir_name(id: u64) -> String {
    format!("seg-{}", id)
}

/// Parse `seg-<id>` back into the id; `None` for anything else.
pub fn parse_segment_dir(name: &str) -> Option<u64> {
    name.strip_prefix("seg-")?.parse().ok()
}

/// One term's occurrences in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPosting {
    pub doc_id: u32,
    pub term_freq: u32,
    /// Token positions of the term within the document, strictly ascending.
    pub positions: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SegmentStatus {
    Active,
    Merging,
    Deleted,
}

/// The `meta.json` descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMeta {
    pub segment_id: u64,
    pub doc_count: u32,
    pub term_count: u32,
    pub size_bytes: u64,
    pub status: SegmentStatus,
    pub level: u32,
    pub create_time: DateTime<Utc>,
}

pub fn write_meta(dir: &Path, meta: &SegmentMeta) -> Result<()> {
    let path = dir.join(META_FILE);
    let bytes = serde_json::to_vec_pretty(meta).map_err(std::io::Error::from)?;
    fs::write(&path, bytes)?;
    fs::File::open(&path)?.sync_all()?;
    Ok(())
}

fn read_meta(dir: &Path) -> Result<SegmentMeta> {
    let path = dir.join(META_FILE);
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::format_in(&path, format!("invalid segment meta: {}", e)))
}

// ============================================================================
// TOMBSTONES
// ============================================================================

/// Write a tombstone set: `{count varint, delta-encoded ids, CRC footer}`.
pub fn write_del_file(path: &Path, deletes: &BTreeSet<u32>) -> Result<()> {
    let ids: Vec<u32> = deletes.iter().copied().collect();
    let mut buf = Vec::new();
    write_varint(ids.len() as u32, &mut buf);
    write_monotone(&ids, &mut buf)?;
    checksum::append_footer(&mut buf);
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, &buf)?;
    fs::File::open(&tmp)?.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_del_file(path: &Path) -> Result<BTreeSet<u32>> {
    let bytes = fs::read(path)?;
    let body = checksum::verify_footer(&bytes).map_err(|msg| Error::format_in(path, msg))?;
    let (count, consumed) = varint_u32(body).map_err(|e| Error::format_in(path, e))?;
    let (ids, used) =
        read_monotone(&body[consumed..], count as usize).map_err(|e| Error::format_in(path, e))?;
    if consumed + used != body.len() {
        return Err(Error::format_in(path, "trailing bytes after tombstone set"));
    }
    Ok(ids.into_iter().collect())
}

// ============================================================================
// DISK SEGMENT
// ============================================================================

/// An open, verified, immutable segment.
#[derive(Debug)]
pub struct DiskSegment {
    dir: PathBuf,
    meta: Mutex<SegmentMeta>,
    dict: Dictionary,
    inv: SegmentFile,
    pos: SegmentFile,
    deletes: RwLock<BTreeSet<u32>>,
    /// Distinct doc ids present in this segment, derived on first use by a
    /// single postings scan (NOT and field queries need the universe).
    doc_universe: OnceCell<BTreeSet<u32>>,
    /// Set once the segment has been superseded; the last holder of an
    /// `Arc` removes the files on drop.
    pending_delete: AtomicBool,
}

/// On a format violation, move the offending file aside as
/// `<name>.quarantine` so a human can inspect it, then fail. The segment
/// is unhealthy either way; the manager decides whether that fails the
/// whole open.
fn quarantining<T>(path: &Path, result: Result<T>) -> Result<T> {
    if let Err(Error::Format(_)) = &result {
        let target = crate::error::quarantine_path(path);
        if let Err(e) = fs::rename(path, &target) {
            warn!(path = %path.display(), error = %e, "failed to quarantine corrupt file");
        } else {
            warn!(path = %path.display(), "corrupt file quarantined");
        }
    }
    result
}

impl DiskSegment {
    /// Open a segment directory, verifying the CRC of all three files.
    pub fn open(dir: &Path) -> Result<Self> {
        let meta = read_meta(dir)?;
        let dict_path = dir.join(DICT_FILE);
        let dict = quarantining(&dict_path, Dictionary::load(&dict_path))?;
        let inv_path = dir.join(INV_FILE);
        let inv = quarantining(&inv_path, SegmentFile::open(&inv_path, INV_MAGIC))?;
        let pos_path = dir.join(POS_FILE);
        let pos = quarantining(&pos_path, SegmentFile::open(&pos_path, POS_MAGIC))?;
        let del_path = dir.join(DEL_FILE);
        let deletes = if del_path.exists() {
            quarantining(&del_path, read_del_file(&del_path))?
        } else {
            BTreeSet::new()
        };
        if dict.len() != meta.term_count as usize {
            return Err(Error::format_in(
                &dir.join(META_FILE),
                format!(
                    "meta termCount {} disagrees with dictionary ({} terms)",
                    meta.term_count,
                    dict.len()
                ),
            ));
        }
        Ok(DiskSegment {
            dir: dir.to_path_buf(),
            meta: Mutex::new(meta),
            dict,
            inv,
            pos,
            deletes: RwLock::new(deletes),
            doc_universe: OnceCell::new(),
            pending_delete: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.meta.lock().segment_id
    }

    pub fn level(&self) -> u32 {
        self.meta.lock().level
    }

    pub fn meta(&self) -> SegmentMeta {
        self.meta.lock().clone()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    /// Docs recorded at write time, before tombstones.
    pub fn doc_count(&self) -> u32 {
        self.meta.lock().doc_count
    }

    pub fn live_doc_count(&self) -> u32 {
        self.doc_count()
            .saturating_sub(self.deletes.read().len() as u32)
    }

    pub fn is_deleted(&self, doc_id: u32) -> bool {
        self.deletes.read().contains(&doc_id)
    }

    /// Tombstone a document. Returns false if it was already tombstoned.
    pub fn delete_doc(&self, doc_id: u32) -> bool {
        self.deletes.write().insert(doc_id)
    }

    pub fn deletes(&self) -> BTreeSet<u32> {
        self.deletes.read().clone()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.read().len()
    }

    /// Durably persist the tombstone set (commit protocol step 5).
    pub fn persist_deletes(&self) -> Result<()> {
        write_del_file(&self.dir.join(DEL_FILE), &self.deletes.read())
    }

    /// Rewrite `meta.json` with a new status.
    pub fn set_status(&self, status: SegmentStatus) -> Result<()> {
        let mut meta = self.meta.lock();
        meta.status = status;
        write_meta(&self.dir, &meta)
    }

    /// Read the full posting list for `term`; `None` if absent.
    pub fn read_postings(&self, term: &str) -> Result<Option<PostingList>> {
        let Some(entry) = self.dict.get(term) else {
            return Ok(None);
        };
        let list = self
            .inv
            .with_reader(entry.postings_offset, |r| read_posting_list(r))?;
        Ok(Some(list))
    }

    /// Bulk-read the positions block for `term`.
    pub fn read_positions(&self, term: &str) -> Result<Vec<(u32, Vec<u32>)>> {
        let Some(entry) = self.dict.get(term) else {
            return Ok(Vec::new());
        };
        self.pos
            .with_reader(entry.positions_offset, |r| read_positions_block(r))
    }

    /// Targeted read of one document's positions for `term`.
    pub fn positions_for_doc(&self, term: &str, doc_id: u32) -> Result<Option<Vec<u32>>> {
        let Some(entry) = self.dict.get(term) else {
            return Ok(None);
        };
        self.pos
            .with_reader(entry.positions_offset, |r| find_doc_positions(r, doc_id))
    }

    /// Every distinct doc id in the segment, tombstoned or not. Derived
    /// once by scanning every posting list, then cached.
    pub fn doc_ids(&self) -> Result<&BTreeSet<u32>> {
        self.doc_universe.get_or_try_init(|| {
            let mut ids = BTreeSet::new();
            for (term, _) in self.dict.iter() {
                if let Some(list) = self.read_postings(term)? {
                    ids.extend(list.doc_ids);
                }
            }
            Ok(ids)
        })
    }

    pub fn mark_pending_delete(&self) {
        self.pending_delete.store(true, Ordering::Release);
    }
}

impl Drop for DiskSegment {
    fn drop(&mut self) {
        if self.pending_delete.load(Ordering::Acquire) {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                warn!(dir = %self.dir.display(), error = %e, "failed to remove superseded segment");
            }
        }
    }
}
