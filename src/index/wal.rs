// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Write-ahead log of intended mutations.
//!
//! Before any ingest batch touches the document table or a segment, its
//! operations are appended here and fsynced. Recovery replays the log
//! against the document table: entries whose effect is already present are
//! skipped, everything else is re-ingested. Replay is therefore idempotent
//! and the log can simply be truncated at each checkpoint.
//!
//! Record layout: `op u8 | timestamp i64 BE (ms) | pathLen varint |
//! pathBytes utf-8 | mtime i64 BE (ms) | size i64 BE`. The current log
//! rotates once it exceeds 16 MiB; rotated files are replayed oldest
//! first and removed at checkpoint.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::codec::{read_u32 as varint_u32, write_u32 as write_varint};
use crate::error::{Error, Result};

/// Rotate the current log once it exceeds this many bytes.
pub const ROTATE_THRESHOLD: u64 = 16 * 1024 * 1024;

pub const CURRENT_WAL: &str = "current.wal";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalOp {
    Add = 1,
    Delete = 2,
    Update = 3,
}

impl WalOp {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(WalOp::Add),
            2 => Some(WalOp::Delete),
            3 => Some(WalOp::Update),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    pub op: WalOp,
    pub timestamp_ms: i64,
    pub path: PathBuf,
    pub mtime_ms: i64,
    pub size: i64,
}

fn encode_entry(entry: &WalEntry, buf: &mut Vec<u8>) {
    buf.push(entry.op as u8);
    buf.extend_from_slice(&entry.timestamp_ms.to_be_bytes());
    let path = entry.path.to_string_lossy();
    let path_bytes = path.as_bytes();
    write_varint(path_bytes.len() as u32, buf);
    buf.extend_from_slice(path_bytes);
    buf.extend_from_slice(&entry.mtime_ms.to_be_bytes());
    buf.extend_from_slice(&entry.size.to_be_bytes());
}

fn decode_entry(bytes: &[u8]) -> Result<(WalEntry, usize)> {
    if bytes.len() < 9 {
        return Err(Error::Format("truncated WAL record".to_string()));
    }
    let op = WalOp::from_u8(bytes[0])
        .ok_or_else(|| Error::Format(format!("unknown WAL op {}", bytes[0])))?;
    let timestamp_ms = i64::from_be_bytes(bytes[1..9].try_into().unwrap());
    let mut pos = 9;
    let (path_len, consumed) = varint_u32(&bytes[pos..])?;
    pos += consumed;
    let path_len = path_len as usize;
    if pos + path_len + 16 > bytes.len() {
        return Err(Error::Format("truncated WAL record".to_string()));
    }
    let path = std::str::from_utf8(&bytes[pos..pos + path_len])
        .map_err(|_| Error::Format("WAL path is not valid UTF-8".to_string()))?;
    pos += path_len;
    let mtime_ms = i64::from_be_bytes(bytes[pos..pos + 8].try_into().unwrap());
    let size = i64::from_be_bytes(bytes[pos + 8..pos + 16].try_into().unwrap());
    pos += 16;
    Ok((
        WalEntry {
            op,
            timestamp_ms,
            path: PathBuf::from(path),
            mtime_ms,
            size,
        },
        pos,
    ))
}

struct WalInner {
    file: File,
    len: u64,
    next_rotation: u32,
}

/// Single-writer append log; the mutex is the writer lock, readers only
/// exist during recovery.
pub struct Wal {
    dir: PathBuf,
    inner: Mutex<WalInner>,
}

impl Wal {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let current = dir.join(CURRENT_WAL);
        let file = OpenOptions::new().create(true).append(true).open(&current)?;
        let len = file.metadata()?.len();
        let next_rotation = Self::rotated_files(dir)?
            .last()
            .map(|(n, _)| n + 1)
            .unwrap_or(1);
        Ok(Wal {
            dir: dir.to_path_buf(),
            inner: Mutex::new(WalInner {
                file,
                len,
                next_rotation,
            }),
        })
    }

    /// Rotated log files, ascending by rotation number.
    fn rotated_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(n) = name
                .strip_prefix("rotated-")
                .and_then(|s| s.strip_suffix(".wal"))
                .and_then(|s| s.parse::<u32>().ok())
            {
                out.push((n, entry.path()));
            }
        }
        out.sort_by_key(|(n, _)| *n);
        Ok(out)
    }

    /// Append `entries` and fsync. Rotates first if the current file is
    /// over the threshold.
    pub fn append(&self, entries: &[WalEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut inner = self.inner.lock();
        if inner.len > ROTATE_THRESHOLD {
            let n = inner.next_rotation;
            let rotated = self.dir.join(format!("rotated-{}.wal", n));
            inner.file.sync_all()?;
            fs::rename(self.dir.join(CURRENT_WAL), rotated)?;
            inner.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.dir.join(CURRENT_WAL))?;
            inner.len = 0;
            inner.next_rotation = n + 1;
        }
        let mut buf = Vec::new();
        for entry in entries {
            encode_entry(entry, &mut buf);
        }
        inner.file.write_all(&buf)?;
        inner.file.sync_data()?;
        inner.len += buf.len() as u64;
        Ok(())
    }

    /// Read every surviving entry, rotated files first, then the current
    /// log. A torn tail (crash mid-append) ends replay of that file with a
    /// warning rather than an error.
    pub fn replay(&self) -> Result<Vec<WalEntry>> {
        let _writer = self.inner.lock();
        let mut files: Vec<PathBuf> = Self::rotated_files(&self.dir)?
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        files.push(self.dir.join(CURRENT_WAL));

        let mut entries = Vec::new();
        for path in files {
            if !path.exists() {
                continue;
            }
            let bytes = fs::read(&path)?;
            let mut pos = 0;
            while pos < bytes.len() {
                match decode_entry(&bytes[pos..]) {
                    Ok((entry, consumed)) => {
                        entries.push(entry);
                        pos += consumed;
                    }
                    Err(_) => {
                        warn!(
                            file = %path.display(),
                            offset = pos,
                            "torn WAL tail, discarding remainder"
                        );
                        break;
                    }
                }
            }
        }
        Ok(entries)
    }

    /// Checkpoint: everything in the log is durably reflected elsewhere,
    /// so drop rotated files and truncate the current one.
    pub fn checkpoint(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        for (_, path) in Self::rotated_files(&self.dir)? {
            fs::remove_file(path)?;
        }
        inner.file = File::create(self.dir.join(CURRENT_WAL))?;
        inner.file.sync_all()?;
        inner.len = 0;
        Ok(())
    }

    /// Total bytes across current and rotated logs.
    pub fn size_bytes(&self) -> Result<u64> {
        let _writer = self.inner.lock();
        let mut total = fs::metadata(self.dir.join(CURRENT_WAL))?.len();
        for (_, path) in Self::rotated_files(&self.dir)? {
            total += fs::metadata(path)?.len();
        }
        Ok(total)
    }
}
