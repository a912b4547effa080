// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The index manager: ingest, durability, segment lifecycle, recovery.
//!
//! Everything on disk under the index directory belongs to this type: the
//! WAL, the manifest, every segment, and the document table. The commit
//! protocol for a batch is:
//!
//! 1. append intended operations to the WAL, fsync;
//! 2. write new segment files into a `.tmp` directory, fsync, rename in;
//! 3. write a fresh manifest to `manifest.tmp`, fsync;
//! 4. rename it over `manifest` — the linearization point;
//! 5. persist tombstone files, fsync;
//! 6. truncate the WAL (checkpoint).
//!
//! A crash before (4) restarts into the previous manifest and replays the
//! WAL; a crash after (4) replays entries whose effects are already on
//! disk, which the replay check detects and skips. Queries pin the segment
//! set with `Arc`s, so a merge can retire segments without ever yanking
//! files out from under an in-flight search.

pub mod ingest;
pub mod manifest;
pub mod wal;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{info, warn};

use crate::docstore::{DocStore, DocType};
use crate::error::{Error, Result};
use crate::query::eval;
use crate::query::{self, MAX_QUERY_BYTES};
use crate::segment::mem::MemSegment;
use crate::segment::merge::merge_segments;
use crate::segment::writer::SegmentWriter;
use crate::segment::{parse_segment_dir, segment_dir_name, DiskSegment, SegmentStatus};
use crate::snippet::{self, Snippet};
use crate::tokenizer::Tokenizer;
use self::ingest::{mtime_millis, run_pipeline, scan_paths, FileScan};
use self::manifest::{ManifestEntry, ManifestStore};
use self::wal::{Wal, WalEntry, WalOp};

/// Segments per level that trigger a tiered merge into the next level.
pub const MERGE_FANOUT: usize = 10;

/// Manifest publications racing a merge retry this many times.
const MERGE_PUBLISH_RETRIES: u32 = 3;

const DOCSTORE_FILE: &str = "documents.db";
const WAL_DIR: &str = "wal";

#[derive(Debug, Clone)]
pub struct IndexConfig {
    pub index_dir: PathBuf,
    /// Ingest worker count, clamped to `[1, 64]`.
    pub threads: usize,
    /// Apply the English stop list during tokenization.
    pub stop_words: bool,
}

impl IndexConfig {
    pub fn new(index_dir: impl Into<PathBuf>) -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        IndexConfig {
            index_dir: index_dir.into(),
            threads,
            stop_words: false,
        }
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// Counters from one `update` run.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct UpdateReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub doc_count: u32,
    pub segment_count: usize,
    pub segments_per_level: BTreeMap<u32, usize>,
    pub index_size_bytes: u64,
    pub wal_size_bytes: u64,
}

/// One search result, snippets included.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: u32,
    pub path: PathBuf,
    pub score: f64,
    pub doc_type: DocType,
    pub size_bytes: u64,
    pub mtime_ms: i64,
    pub snippets: Vec<Snippet>,
}

pub struct IndexManager {
    config: IndexConfig,
    tokenizer: Tokenizer,
    store: Arc<DocStore>,
    mem: Arc<MemSegment>,
    wal: Wal,
    manifest: ManifestStore,
    segments: RwLock<Vec<Arc<DiskSegment>>>,
    /// Doc ids deleted this session whose postings may still sit in the
    /// mem-segment; filtered out at flush so they never reach disk
    /// without a tombstone.
    session_deletes: RwLock<BTreeSet<u32>>,
    next_segment_id: AtomicU64,
    /// Serializes update/rebuild runs (the pipeline has one producer).
    ingest_lock: Mutex<()>,
    /// Serializes the commit protocol and manifest-affecting merges.
    commit_lock: Mutex<()>,
}

impl IndexManager {
    /// Open an index directory: load the manifest, verify and open every
    /// referenced segment, sweep orphans, replay the WAL.
    pub fn open(config: IndexConfig) -> Result<Self> {
        fs::create_dir_all(&config.index_dir)?;
        let manifest = ManifestStore::load(&config.index_dir)?;
        let current = manifest.current();

        let mut segments = Vec::new();
        for entry in &current.segments {
            let dir = config.index_dir.join(segment_dir_name(entry.id));
            // A corrupt segment referenced by the manifest fails the whole
            // open; serving a silently partial index is worse.
            segments.push(Arc::new(DiskSegment::open(&dir)?));
        }

        sweep_orphans(&config.index_dir, &current.segments)?;

        let next_segment_id = current.segments.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let store = Arc::new(DocStore::open(&config.index_dir.join(DOCSTORE_FILE))?);
        let wal = Wal::open(&config.index_dir.join(WAL_DIR))?;
        let tokenizer = Tokenizer::new(config.stop_words);

        let manager = IndexManager {
            config,
            tokenizer,
            store,
            mem: Arc::new(MemSegment::new()),
            wal,
            manifest,
            segments: RwLock::new(segments),
            session_deletes: RwLock::new(BTreeSet::new()),
            next_segment_id: AtomicU64::new(next_segment_id),
            ingest_lock: Mutex::new(()),
            commit_lock: Mutex::new(()),
        };
        manager.recover()?;
        Ok(manager)
    }

    /// Replay the WAL against the document table. Entries whose effect is
    /// already present are skipped; the rest trigger a fresh ingest round.
    fn recover(&self) -> Result<()> {
        let entries = self.wal.replay()?;
        if entries.is_empty() {
            return Ok(());
        }
        let _ingest = self.ingest_lock.lock();

        let mut pending: Vec<PathBuf> = Vec::new();
        for entry in &entries {
            match entry.op {
                WalOp::Add | WalOp::Update => match self.store.find_by_path(&entry.path) {
                    Some(doc)
                        if doc.mtime_ms == entry.mtime_ms
                            && doc.size_bytes as i64 == entry.size =>
                    {
                        // Effect already on disk; replay must be idempotent.
                    }
                    _ => pending.push(entry.path.clone()),
                },
                WalOp::Delete => {
                    if self.store.find_by_path(&entry.path).is_some() {
                        self.apply_delete(&entry.path);
                    }
                }
            }
        }
        pending.sort();
        pending.dedup();

        let mut jobs = Vec::new();
        for path in pending {
            match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_file() => {
                    if self.store.find_by_path(&path).is_some() {
                        // Stale version indexed; replace it.
                        self.apply_delete(&path);
                    }
                    jobs.push(FileScan {
                        mtime_ms: mtime_millis(&meta),
                        size: meta.len(),
                        path,
                    });
                }
                _ => {
                    // File vanished between the logged intent and now.
                    self.apply_delete(&path);
                }
            }
        }
        info!(entries = entries.len(), reingest = jobs.len(), "WAL replay");

        run_pipeline(
            jobs,
            self.config.threads,
            &self.mem,
            &self.store,
            self.tokenizer,
            || self.commit_batch(false),
        )?;
        // Recovery completes with a checkpoint (inside the final commit).
        self.commit_batch(true)?;
        Ok(())
    }

    /// Incrementally index `roots`: unseen paths are added, changed paths
    /// replaced under a fresh doc id, vanished paths tombstoned.
    pub fn update(&self, roots: &[PathBuf]) -> Result<UpdateReport> {
        let _ingest = self.ingest_lock.lock();

        let roots: Vec<PathBuf> = roots
            .iter()
            .map(|r| fs::canonicalize(r).unwrap_or_else(|_| r.clone()))
            .collect();
        let scan = scan_paths(&roots);
        let known = self.store.all_paths();
        let scanned: HashSet<&Path> = scan.iter().map(|f| f.path.as_path()).collect();

        let mut adds: Vec<FileScan> = Vec::new();
        let mut updates: Vec<FileScan> = Vec::new();
        for file in &scan {
            match known.get(&file.path) {
                None => adds.push(file.clone()),
                Some(&(mtime_ms, size)) if mtime_ms != file.mtime_ms || size != file.size => {
                    updates.push(file.clone());
                }
                Some(_) => {}
            }
        }
        // Deletions are judged only under the scanned roots; indexing a
        // second directory must not evict the first one's documents.
        let deletes: Vec<PathBuf> = known
            .keys()
            .filter(|path| {
                roots.iter().any(|root| path.starts_with(root)) && !scanned.contains(path.as_path())
            })
            .cloned()
            .collect();

        // Intent first: all three operation kinds hit the WAL before any
        // of them touches the table or a segment.
        let now_ms = Utc::now().timestamp_millis();
        let mut intents = Vec::with_capacity(adds.len() + updates.len() + deletes.len());
        for file in &adds {
            intents.push(wal_entry(WalOp::Add, now_ms, file));
        }
        for file in &updates {
            intents.push(wal_entry(WalOp::Update, now_ms, file));
        }
        for path in &deletes {
            intents.push(WalEntry {
                op: WalOp::Delete,
                timestamp_ms: now_ms,
                path: path.clone(),
                mtime_ms: 0,
                size: 0,
            });
        }
        self.wal.append(&intents)?;

        for path in &deletes {
            self.apply_delete(path);
        }
        for file in &updates {
            self.apply_delete(&file.path);
        }

        let jobs: Vec<FileScan> = adds.iter().chain(updates.iter()).cloned().collect();
        let stats = run_pipeline(
            jobs,
            self.config.threads,
            &self.mem,
            &self.store,
            self.tokenizer,
            || self.commit_batch(false),
        )?;
        self.commit_batch(true)?;
        self.maybe_merge()?;

        let report = UpdateReport {
            added: adds.len(),
            updated: updates.len(),
            deleted: deletes.len(),
            skipped: stats.skipped,
        };
        info!(
            added = report.added,
            updated = report.updated,
            deleted = report.deleted,
            skipped = report.skipped,
            "index update complete"
        );
        Ok(report)
    }

    /// Drop every segment, the table, and the WAL, then index from scratch.
    pub fn rebuild(&self, roots: &[PathBuf]) -> Result<UpdateReport> {
        {
            let _ingest = self.ingest_lock.lock();
            let _commit = self.commit_lock.lock();
            let mut segments = self.segments.write();
            for segment in segments.drain(..) {
                segment.set_status(SegmentStatus::Deleted).ok();
                segment.mark_pending_delete();
            }
            let current = self.manifest.current();
            self.manifest.publish(current.generation, Vec::new())?;
            self.store.clear();
            self.store.persist()?;
            self.mem.drain(&BTreeSet::new());
            self.session_deletes.write().clear();
            self.wal.checkpoint()?;
            info!("index cleared for rebuild");
        }
        self.update(roots)
    }

    /// Tombstone `path`'s current doc id everywhere it could live.
    fn apply_delete(&self, path: &Path) -> Option<u32> {
        let doc_id = self.store.delete_by_path(path)?;
        for segment in self.segments.read().iter() {
            segment.delete_doc(doc_id);
        }
        self.session_deletes.write().insert(doc_id);
        Some(doc_id)
    }

    /// Run the commit protocol for whatever has accumulated: flush the
    /// mem-segment if non-empty, publish, persist tombstones, checkpoint.
    ///
    /// Mid-run flushes pass `checkpoint = false`: the WAL still holds
    /// intents for files the workers have not reached yet, and replaying
    /// the already-applied prefix is exactly what the idempotence check
    /// is for. Only the final commit of a batch truncates the log.
    fn commit_batch(&self, checkpoint: bool) -> Result<()> {
        let _commit = self.commit_lock.lock();

        let drained = self.mem.drain(&self.session_deletes.read().clone());
        if !drained.is_empty() {
            let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
            let tmp_dir = self
                .config
                .index_dir
                .join(format!("{}.tmp", segment_dir_name(id)));

            let built = (|| -> Result<Arc<DiskSegment>> {
                let mut writer = SegmentWriter::create(&tmp_dir)?;
                let mut docs = BTreeSet::new();
                for (term, postings) in &drained {
                    for posting in postings {
                        docs.insert(posting.doc_id);
                    }
                    writer.add_term(term, postings)?;
                }
                writer.finish(id, 0, docs.len() as u32)?;

                let final_dir = self.config.index_dir.join(segment_dir_name(id));
                fs::rename(&tmp_dir, &final_dir)?;
                fs::File::open(&self.config.index_dir)?.sync_all()?;
                Ok(Arc::new(DiskSegment::open(&final_dir)?))
            })();
            let segment = match built {
                Ok(segment) => segment,
                Err(e) => {
                    // Roll back: previous manifest untouched, temp files
                    // gone; the WAL still holds the intents for recovery.
                    let _ = fs::remove_dir_all(&tmp_dir);
                    return Err(e);
                }
            };

            self.store.persist()?;
            let current = self.manifest.current();
            let mut entries = current.segments.clone();
            entries.push(ManifestEntry { id, level: 0 });
            self.manifest.publish(current.generation, entries)?;
            self.segments.write().push(segment);
            info!(segment = id, terms = drained.len(), "segment published");
        } else {
            self.store.persist()?;
        }

        for segment in self.segments.read().iter() {
            segment.persist_deletes()?;
        }
        if checkpoint {
            self.wal.checkpoint()?;
            self.session_deletes.write().clear();
        }
        Ok(())
    }

    /// Tiered merge: whenever ten segments share a level, fold them into
    /// one at the next level, dropping tombstoned docs on the way.
    fn maybe_merge(&self) -> Result<()> {
        loop {
            let candidate = {
                let segments = self.segments.read();
                let mut by_level: BTreeMap<u32, Vec<Arc<DiskSegment>>> = BTreeMap::new();
                for segment in segments.iter() {
                    by_level
                        .entry(segment.level())
                        .or_default()
                        .push(Arc::clone(segment));
                }
                by_level.into_iter().find_map(|(level, mut group)| {
                    if group.len() >= MERGE_FANOUT {
                        group.sort_by_key(|s| s.id());
                        group.truncate(MERGE_FANOUT);
                        Some((level, group))
                    } else {
                        None
                    }
                })
            };
            let Some((level, inputs)) = candidate else {
                return Ok(());
            };
            self.merge_once(level, &inputs)?;
        }
    }

    fn merge_once(&self, level: u32, inputs: &[Arc<DiskSegment>]) -> Result<()> {
        for segment in inputs {
            segment.set_status(SegmentStatus::Merging)?;
        }
        let id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        let tmp_dir = self
            .config
            .index_dir
            .join(format!("{}.tmp", segment_dir_name(id)));

        let mut writer = SegmentWriter::create(&tmp_dir)?;
        let live = match merge_segments(inputs, &mut writer) {
            Ok(live) => live,
            Err(e) => {
                drop(writer);
                let _ = fs::remove_dir_all(&tmp_dir);
                for segment in inputs {
                    segment.set_status(SegmentStatus::Active).ok();
                }
                return Err(e);
            }
        };

        let output = if live > 0 {
            writer.finish(id, level + 1, live)?;
            let final_dir = self.config.index_dir.join(segment_dir_name(id));
            fs::rename(&tmp_dir, &final_dir)?;
            fs::File::open(&self.config.index_dir)?.sync_all()?;
            Some(Arc::new(DiskSegment::open(&final_dir)?))
        } else {
            // Every contributing doc was tombstoned; publish the shrunken
            // set with no replacement segment.
            drop(writer);
            let _ = fs::remove_dir_all(&tmp_dir);
            None
        };

        let input_ids: BTreeSet<u64> = inputs.iter().map(|s| s.id()).collect();
        {
            let _commit = self.commit_lock.lock();
            let mut attempt = 0;
            loop {
                let current = self.manifest.current();
                let mut entries: Vec<ManifestEntry> = current
                    .segments
                    .iter()
                    .filter(|e| !input_ids.contains(&e.id))
                    .copied()
                    .collect();
                if output.is_some() {
                    entries.push(ManifestEntry { id, level: level + 1 });
                }
                match self.manifest.publish(current.generation, entries) {
                    Ok(_) => break,
                    Err(Error::ConcurrentModification { .. }) if attempt + 1 < MERGE_PUBLISH_RETRIES => {
                        attempt += 1;
                    }
                    Err(Error::ConcurrentModification { .. }) => {
                        return Err(Error::ConcurrentModification {
                            retries: MERGE_PUBLISH_RETRIES,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }

            let mut segments = self.segments.write();
            segments.retain(|s| !input_ids.contains(&s.id()));
            if let Some(segment) = output {
                segments.push(segment);
            }
        }

        // Retire inputs: files disappear when the last snapshot drops.
        for segment in inputs {
            segment.set_status(SegmentStatus::Deleted)?;
            segment.mark_pending_delete();
        }
        info!(
            level,
            merged = inputs.len(),
            output = id,
            live_docs = live,
            "tiered merge complete"
        );
        Ok(())
    }

    /// An immutable handle on the active segment set. Holding it pins the
    /// referenced files even across merges.
    pub fn snapshot(&self) -> Vec<Arc<DiskSegment>> {
        self.segments.read().clone()
    }

    /// Parse, evaluate, rank, and synthesize snippets.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        if query.len() > MAX_QUERY_BYTES {
            return Err(Error::Validation(format!(
                "query length {} exceeds {} bytes",
                query.len(),
                MAX_QUERY_BYTES
            )));
        }
        let parsed = query::parse(query)?;
        let snapshot = self.snapshot();
        let scored = eval::execute(&parsed, &snapshot, &self.store, limit)?;
        let highlight: Vec<String> = query::highlight_terms(&parsed.root).into_iter().collect();

        let mut hits = Vec::with_capacity(scored.len());
        for s in scored {
            let Some(doc) = self.store.find_by_id(s.doc_id) else {
                continue;
            };
            let snippets = match fs::read(&doc.path) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    snippet::generate(&text, highlight.iter().map(String::as_str))
                }
                Err(e) => {
                    warn!(path = %doc.path.display(), error = %e, "snippet source unreadable");
                    Vec::new()
                }
            };
            hits.push(SearchHit {
                doc_id: s.doc_id,
                path: doc.path,
                score: s.score,
                doc_type: doc.doc_type,
                size_bytes: doc.size_bytes,
                mtime_ms: doc.mtime_ms,
                snippets,
            });
        }
        Ok(hits)
    }

    pub fn status(&self) -> Result<IndexStatus> {
        let segments = self.segments.read();
        let mut per_level: BTreeMap<u32, usize> = BTreeMap::new();
        let mut size = 0u64;
        for segment in segments.iter() {
            *per_level.entry(segment.level()).or_default() += 1;
            size += segment.meta().size_bytes;
        }
        Ok(IndexStatus {
            doc_count: self.store.total_doc_count(),
            segment_count: segments.len(),
            segments_per_level: per_level,
            index_size_bytes: size,
            wal_size_bytes: self.wal.size_bytes()?,
        })
    }

    pub fn doc_store(&self) -> &DocStore {
        &self.store
    }
}

fn wal_entry(op: WalOp, timestamp_ms: i64, file: &FileScan) -> WalEntry {
    WalEntry {
        op,
        timestamp_ms,
        path: file.path.clone(),
        mtime_ms: file.mtime_ms,
        size: file.size as i64,
    }
}

/// Remove segment directories the manifest does not reference: leftovers
/// of a crash between segment rename and manifest rename, plus stale
/// `.tmp` build directories.
fn sweep_orphans(index_dir: &Path, referenced: &[ManifestEntry]) -> Result<()> {
    let keep: HashSet<u64> = referenced.iter().map(|e| e.id).collect();
    for entry in fs::read_dir(index_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let orphan = if name.ends_with(".tmp") {
            name.starts_with("seg-")
        } else {
            matches!(parse_segment_dir(&name), Some(id) if !keep.contains(&id))
        };
        if orphan {
            warn!(dir = %name, "removing orphan segment directory");
            fs::remove_dir_all(entry.path())?;
        }
    }
    Ok(())
}
