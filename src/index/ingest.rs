// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The ingest pipeline: one producer, a bounded queue, N tokenizer workers.
//!
//! The producer walks the job list into a `sync_channel` of capacity 1000
//! and blocks when the queue is full; workers block on an empty queue and
//! exit when the channel closes (the shutdown sentinel). Each worker reads
//! the file (UTF-8, lossy — undecodable bytes become U+FFFD), tokenizes,
//! records the document row, and appends to the shared mem-segment.
//!
//! Flushing is the coordinator's job: workers nudge it over a hint channel
//! whenever the mem-segment crosses a threshold, and the coordinator runs
//! the commit protocol on its own thread so the workers only ever block on
//! the mem-segment's read lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::docstore::{DocStore, DocType, Document};
use crate::error::Result;
use crate::segment::mem::MemSegment;
use crate::tokenizer::Tokenizer;

/// Capacity of the bounded ingest queue.
pub const QUEUE_CAPACITY: usize = 1000;

/// One file observed by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileScan {
    pub path: PathBuf,
    pub mtime_ms: i64,
    pub size: u64,
}

/// Outcome counters for one pipeline run.
#[derive(Debug, Default, Clone, Copy)]
pub struct IngestStats {
    pub indexed: usize,
    pub skipped: usize,
}

/// Recursively collect regular files under `roots`, skipping hidden
/// entries and anything whose metadata cannot be read.
pub fn scan_paths(roots: &[PathBuf]) -> Vec<FileScan> {
    let mut out = Vec::new();
    for root in roots {
        walk(root, &mut out);
    }
    out
}

fn walk(path: &Path, out: &mut Vec<FileScan>) {
    let hidden = path
        .file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(false);
    if hidden {
        return;
    }
    let Ok(meta) = fs::symlink_metadata(path) else {
        warn!(path = %path.display(), "cannot stat, skipping");
        return;
    };
    if meta.is_symlink() {
        return;
    }
    if meta.is_dir() {
        let Ok(entries) = fs::read_dir(path) else {
            warn!(path = %path.display(), "cannot read directory, skipping");
            return;
        };
        let mut children: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        children.sort();
        for child in children {
            walk(&child, out);
        }
        return;
    }
    if meta.is_file() {
        out.push(FileScan {
            path: path.to_path_buf(),
            mtime_ms: mtime_millis(&meta),
            size: meta.len(),
        });
    }
}

pub fn mtime_millis(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Run the worker pool over `jobs`. `flush` is invoked on the calling
/// thread whenever the mem-segment reports a threshold crossing, and the
/// call returns only after every worker has exited.
pub fn run_pipeline(
    jobs: Vec<FileScan>,
    workers: usize,
    mem: &Arc<MemSegment>,
    store: &Arc<DocStore>,
    tokenizer: Tokenizer,
    mut flush: impl FnMut() -> Result<()>,
) -> Result<IngestStats> {
    if jobs.is_empty() {
        return Ok(IngestStats::default());
    }
    let workers = workers.clamp(1, 64);
    let total = jobs.len();
    let (job_tx, job_rx) = mpsc::sync_channel::<FileScan>(QUEUE_CAPACITY);
    let job_rx = Arc::new(Mutex::new(job_rx));
    let (hint_tx, hint_rx) = mpsc::channel::<()>();
    let skipped = Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let mut flush_result: Result<()> = Ok(());
    std::thread::scope(|scope| {
        // Producer: feeds the bounded queue, blocking when it is full.
        scope.spawn(move || {
            for job in jobs {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
            // Dropping the sender closes the channel: the shutdown sentinel.
        });

        for _ in 0..workers {
            let job_rx = Arc::clone(&job_rx);
            let hint_tx = hint_tx.clone();
            let mem = Arc::clone(mem);
            let store = Arc::clone(store);
            let skipped = Arc::clone(&skipped);
            scope.spawn(move || {
                loop {
                    let job = match job_rx.lock().recv() {
                        Ok(job) => job,
                        Err(_) => break,
                    };
                    if !ingest_one(&job, &mem, &store, tokenizer) {
                        skipped.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                    if mem.should_flush() {
                        // Coordinator may already be flushing; a lost hint
                        // is fine, it re-checks on every wakeup.
                        let _ = hint_tx.send(());
                    }
                }
            });
        }
        drop(hint_tx);

        // Coordinator: flush on hints until every worker has hung up.
        loop {
            match hint_rx.recv_timeout(Duration::from_millis(100)) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {
                    if mem.should_flush() {
                        if let Err(e) = flush() {
                            flush_result = Err(e);
                            break;
                        }
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    });
    flush_result?;

    let skipped = skipped.load(std::sync::atomic::Ordering::Relaxed);
    debug!(total, skipped, "ingest pipeline drained");
    Ok(IngestStats {
        indexed: total - skipped,
        skipped,
    })
}

/// Read, tokenize, record, append. Returns false when the file had to be
/// skipped.
fn ingest_one(job: &FileScan, mem: &MemSegment, store: &DocStore, tokenizer: Tokenizer) -> bool {
    let bytes = match fs::read(&job.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %job.path.display(), error = %e, "unreadable file, skipping");
            return false;
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let tokens = tokenizer.tokenize(&text);

    let extension = job
        .path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let doc_id = store.next_doc_id();
    let document = Document {
        doc_id,
        path: job.path.clone(),
        extension: extension.clone(),
        size_bytes: job.size,
        mtime_ms: job.mtime_ms,
        doc_type: DocType::from_extension(&extension),
        token_count: tokens.len() as u32,
    };
    if let Err(e) = store.insert(document) {
        warn!(path = %job.path.display(), error = %e, "document row rejected, skipping");
        return false;
    }
    mem.add_document(doc_id, &tokens);
    true
}
